// ==========================================
// Duty Roster Engine - station allocator
// ==========================================
// People: ascending by fairness score (stable)
// Stations: descending by current weight (stable, missing = 10)
// Assignment: station = stations[i % len]
// ==========================================

use crate::domain::assignment::StationAssignment;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// A person with the fairness score used for ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPerson {
    pub person: String,
    pub score: f64,
}

/// A station with its current weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedStation {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Default)]
pub struct StationAllocator {}

impl StationAllocator {
    pub fn new() -> Self {
        Self {}
    }

    /// Round-robin of people over stations, lowest score first onto the
    /// heaviest station.
    pub fn allocate(
        &self,
        date: NaiveDate,
        category: &str,
        cohort: i32,
        mut people: Vec<ScoredPerson>,
        mut stations: Vec<WeightedStation>,
    ) -> EngineResult<Vec<StationAssignment>> {
        if people.is_empty() {
            return Ok(Vec::new());
        }
        if stations.is_empty() {
            return Err(EngineError::NoStations(category.to_string()));
        }

        // sort_by is stable: equal keys keep roster order
        people.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
        stations.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));

        Ok(people
            .into_iter()
            .enumerate()
            .map(|(i, p)| StationAssignment {
                date,
                category: category.to_string(),
                cohort,
                person: p.person,
                station: stations[i % stations.len()].name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()
    }

    fn scored(entries: &[(&str, f64)]) -> Vec<ScoredPerson> {
        entries
            .iter()
            .map(|(p, s)| ScoredPerson {
                person: p.to_string(),
                score: *s,
            })
            .collect()
    }

    fn stations(entries: &[(&str, f64)]) -> Vec<WeightedStation> {
        entries
            .iter()
            .map(|(n, w)| WeightedStation {
                name: n.to_string(),
                weight: *w,
            })
            .collect()
    }

    fn station_of<'a>(out: &'a [StationAssignment], person: &str) -> &'a str {
        out.iter()
            .find(|a| a.person == person)
            .map(|a| a.station.as_str())
            .unwrap()
    }

    /// Lowest score lands on the heaviest station. This ordering is kept
    /// as-is pending confirmation from the roster owners.
    #[test]
    fn test_lowest_score_gets_heaviest_station_pending_owner_confirmation() {
        let people = scored(&[("p10", 10.0), ("p4a", 4.0), ("p8", 8.0), ("p2", 2.0), ("p6", 6.0), ("p4b", 4.0)]);
        let st = stations(&[
            ("лента", 8.0),
            ("тарелки", 12.0),
            ("ГЦ", 18.0),
            ("стаканы", 9.0),
            ("овощи", 15.0),
            ("железо", 10.0),
        ]);
        let out = StationAllocator::new().allocate(date(), "с", 2023, people, st).unwrap();

        assert_eq!(station_of(&out, "p2"), "ГЦ");
        assert_eq!(station_of(&out, "p4a"), "овощи");
        assert_eq!(station_of(&out, "p4b"), "тарелки");
        assert_eq!(station_of(&out, "p6"), "железо");
        assert_eq!(station_of(&out, "p8"), "стаканы");
        assert_eq!(station_of(&out, "p10"), "лента");
    }

    #[test]
    fn test_more_people_than_stations_wraps_around() {
        let people = scored(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]);
        let st = stations(&[("ГЦ", 18.0), ("лента", 8.0)]);
        let out = StationAllocator::new().allocate(date(), "с", 2023, people, st).unwrap();

        assert_eq!(out.len(), 5);
        let names: Vec<_> = out.iter().map(|a| a.station.as_str()).collect();
        assert_eq!(names, vec!["ГЦ", "лента", "ГЦ", "лента", "ГЦ"]);
    }

    #[test]
    fn test_equal_weights_keep_station_order() {
        let people = scored(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]);
        let st = stations(&[("ГЦ", 10.0), ("овощи", 10.0), ("тарелки", 10.0)]);
        let out = StationAllocator::new().allocate(date(), "с", 2023, people, st).unwrap();
        let pairs: Vec<_> = out.iter().map(|a| (a.person.as_str(), a.station.as_str())).collect();
        assert_eq!(pairs, vec![("a", "ГЦ"), ("b", "овощи"), ("c", "тарелки")]);
    }

    #[test]
    fn test_empty_inputs() {
        let alloc = StationAllocator::new();
        assert!(alloc.allocate(date(), "с", 2023, Vec::new(), Vec::new()).unwrap().is_empty());
        let err = alloc.allocate(date(), "с", 2023, scored(&[("a", 1.0)]), Vec::new());
        assert!(matches!(err, Err(EngineError::NoStations(_))));
    }
}
