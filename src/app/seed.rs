// ==========================================
// Duty Roster Engine - default category seeding
// ==========================================
// Idempotent: existing categories are left untouched
// ==========================================

use tracing::info;

use crate::config::AllocationSettings;
use crate::repository::{CategoryRepository, RepositoryResult};

/// Top-level duties with their roster role codes.
pub const DEFAULT_TOP_LEVEL: [(&str, &str); 3] = [("Курс", "к"), ("ГБР", "гбр"), ("ЗУБ", "зуб")];

/// Ensures the default top-level duties, the canteen with its stations and
/// the female duty parent exist. Returns the number of categories present.
pub fn seed_default_categories(repo: &CategoryRepository, settings: &AllocationSettings) -> RepositoryResult<usize> {
    for (name, code) in DEFAULT_TOP_LEVEL {
        repo.ensure(name, Some(code), None)?;
    }

    let canteen = repo.ensure(&settings.canteen_parent, Some("с"), None)?;
    for station in &settings.fallback_stations {
        repo.ensure(station, None, Some(canteen))?;
    }
    repo.ensure(&settings.female_parent, None, None)?;

    let total = repo.list_all()?.len();
    info!(categories = total, "default categories ensured");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_seed_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let repo = CategoryRepository::new(Arc::new(Mutex::new(conn)));
        let settings = AllocationSettings::default();

        let first = seed_default_categories(&repo, &settings).unwrap();
        let second = seed_default_categories(&repo, &settings).unwrap();
        assert_eq!(first, 11);
        assert_eq!(first, second);

        let canteen = repo.find_by_code("с").unwrap().unwrap();
        assert_eq!(canteen.name, "Столовая");
        assert_eq!(repo.list_children(canteen.id).unwrap().len(), 6);
        assert!(repo.find_by_name("Женский наряд").unwrap().unwrap().is_top_level());
    }
}
