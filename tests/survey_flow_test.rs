// ==========================================
// Survey flow integration test
// ==========================================
// pairs / progress / finalize per stage and parent weight propagation
// ==========================================


#[cfg(test)]
mod survey_flow_test {
    use duty_roster_engine::api::ApiError;
    use duty_roster_engine::app::seed_default_categories;
    use duty_roster_engine::domain::{ActorRole, WeightStage};

    use crate::test_helpers::{assert_close, create_test_state};

    #[test]
    fn test_seeded_survey_pairs_and_progress() {
        let (_file, state) = create_test_state();
        let settings = state.config_manager.load_allocation_settings().unwrap();
        seed_default_categories(&state.repos.category_repo, &settings).unwrap();

        assert_eq!(state.survey_api.list_pairs(WeightStage::Main).unwrap().len(), 10);
        assert_eq!(state.survey_api.list_pairs(WeightStage::Canteen).unwrap().len(), 15);
        assert!(state.survey_api.list_pairs(WeightStage::Female).unwrap().is_empty());

        let pair = &state.survey_api.list_pairs(WeightStage::Canteen).unwrap()[0];
        for voter in 1..=3 {
            state
                .survey_api
                .submit_vote(voter, WeightStage::Canteen, pair.category_a_id, pair.category_b_id, "equal")
                .unwrap();
        }
        // a changed mind replaces the earlier vote
        state
            .survey_api
            .submit_vote(3, WeightStage::Canteen, pair.category_b_id, pair.category_a_id, "a")
            .unwrap();

        let progress = state.survey_api.progress(WeightStage::Canteen).unwrap();
        assert_eq!(progress.votes, 3);
        assert_eq!(progress.voters, 3);
        assert_eq!(progress.pairs, 15);
    }

    #[test]
    fn test_female_stage_follows_parent_weight() {
        let (_file, state) = create_test_state();
        let settings = state.config_manager.load_allocation_settings().unwrap();
        seed_default_categories(&state.repos.category_repo, &settings).unwrap();

        let cats = &state.repos.category_repo;
        let female = cats.find_by_name(&settings.female_parent).unwrap().unwrap();
        let kitchen = cats.insert("Кухня", None, Some(female.id)).unwrap();
        let laundry = cats.insert("Прачечная", None, Some(female.id)).unwrap();
        state
            .survey_api
            .submit_vote(7, WeightStage::Female, kitchen, laundry, "a")
            .unwrap();

        // the female editor may finalize her stage only
        assert!(matches!(
            state.survey_api.finalize(ActorRole::FemaleEditor, Some(WeightStage::Main)),
            Err(ApiError::Unauthorized { .. })
        ));
        state
            .survey_api
            .finalize(ActorRole::FemaleEditor, Some(WeightStage::Female))
            .unwrap();

        // no stored parent weight yet: base 10
        let w = state.repos.weight_repo.weights_for(&[kitchen, laundry]).unwrap();
        assert_close(w[&kitchen], 16.0);
        assert_close(w[&laundry], 8.0);

        // full finalize computes the parent first (no main votes: 8) and reuses it
        state.survey_api.finalize(ActorRole::Admin, None).unwrap();
        let w = state
            .repos
            .weight_repo
            .weights_for(&[female.id, kitchen, laundry])
            .unwrap();
        assert_close(w[&female.id], 8.0);
        assert_close(w[&kitchen], 12.8);
        assert_close(w[&laundry], 6.4);
    }
}
