// ==========================================
// Duty Roster Engine - shift partitioner
// ==========================================
// Course duty: first person keeps the fixed role (shift 0),
//              next three rotate on shifts 1..3, the rest float (0)
// Rapid reaction: pairs, shift = index / 2 + 1
// Other shift-bearing roles: shift = index % 3 + 1
// Order comes from a PermutationSource
// ==========================================

use crate::domain::assignment::{ShiftAssignment, FIXED_ROLE_SHIFT};
use crate::domain::types::CategoryKind;
use crate::engine::permutation::PermutationSource;
use chrono::NaiveDate;

/// Rotating shifts on course duty.
pub const COURSE_ROTATING_SHIFTS: usize = 3;
/// Cycle length for shift-bearing roles without a dedicated rule.
pub const DEFAULT_SHIFT_CYCLE: usize = 3;

/// Shift number for the person at `index` after permutation.
pub fn shift_for(kind: CategoryKind, index: usize) -> i32 {
    match kind {
        CategoryKind::Course => {
            if (1..=COURSE_ROTATING_SHIFTS).contains(&index) {
                index as i32
            } else {
                FIXED_ROLE_SHIFT
            }
        }
        CategoryKind::RapidReaction => (index / 2 + 1) as i32,
        _ => (index % DEFAULT_SHIFT_CYCLE + 1) as i32,
    }
}

#[derive(Debug, Default)]
pub struct ShiftPartitioner {}

impl ShiftPartitioner {
    pub fn new() -> Self {
        Self {}
    }

    /// Splits the people rostered on (date, category, cohort) into shifts.
    ///
    /// Every person receives exactly one assignment.
    pub fn partition<P: PermutationSource>(
        &self,
        date: NaiveDate,
        category: &str,
        cohort: i32,
        people: &[String],
        perm: &mut P,
    ) -> Vec<ShiftAssignment> {
        let kind = CategoryKind::from_code(category);
        let mut order: Vec<&String> = people.iter().collect();
        perm.permute(&mut order);

        order
            .into_iter()
            .enumerate()
            .map(|(i, person)| ShiftAssignment {
                date,
                category: category.to_string(),
                cohort,
                person: person.clone(),
                shift: shift_for(kind, i),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::permutation::{IdentityPermutation, RngPermutation};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    fn people(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("курсант-{}", i)).collect()
    }

    fn shifts(v: &[ShiftAssignment]) -> Vec<i32> {
        v.iter().map(|a| a.shift).collect()
    }

    #[test]
    fn test_course_five_people() {
        let p = ShiftPartitioner::new();
        let out = p.partition(date(), "к", 2023, &people(5), &mut IdentityPermutation);
        assert_eq!(shifts(&out), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_course_small_groups() {
        let p = ShiftPartitioner::new();
        assert_eq!(shifts(&p.partition(date(), "к", 2023, &people(1), &mut IdentityPermutation)), vec![0]);
        assert_eq!(shifts(&p.partition(date(), "к", 2023, &people(3), &mut IdentityPermutation)), vec![0, 1, 2]);
        assert!(p.partition(date(), "к", 2023, &[], &mut IdentityPermutation).is_empty());
    }

    #[test]
    fn test_rapid_reaction_pairs() {
        let p = ShiftPartitioner::new();
        let out = p.partition(date(), "гбр", 2023, &people(5), &mut IdentityPermutation);
        assert_eq!(shifts(&out), vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn test_other_roles_cycle() {
        let p = ShiftPartitioner::new();
        let out = p.partition(date(), "зуб", 2023, &people(7), &mut IdentityPermutation);
        assert_eq!(shifts(&out), vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_every_person_assigned_once_under_shuffle() {
        let p = ShiftPartitioner::new();
        let roster = people(9);
        let mut perm = RngPermutation::new(StdRng::seed_from_u64(42));
        let out = p.partition(date(), "к", 2024, &roster, &mut perm);

        assert_eq!(out.len(), roster.len());
        let assigned: HashSet<_> = out.iter().map(|a| a.person.clone()).collect();
        assert_eq!(assigned, roster.iter().cloned().collect::<HashSet<_>>());
        assert_eq!(out.iter().filter(|a| a.shift == 0).count(), 6);
        assert!(out.iter().all(|a| a.cohort == 2024 && a.category == "к"));
    }
}
