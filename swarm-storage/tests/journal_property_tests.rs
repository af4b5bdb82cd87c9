//! Property-based tests for journal file naming and persistence.

use proptest::prelude::*;
use swarm_storage::{safe_id, JournalStore};

fn arb_agent_id() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9_-]{0,10}",
        "[α-ω]{1,3}",
        "[a-z][a-zA-Z0-9 ./:\\\\é]{0,11}",
    ]
}

mod prop_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_safe_id_is_file_name_safe(id in arb_agent_id()) {
            let safe = safe_id(&id);
            prop_assert!(safe.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')));
        }

        #[test]
        fn prop_safe_id_is_injective(a in arb_agent_id(), b in arb_agent_id()) {
            prop_assume!(a != b);
            prop_assert_ne!(safe_id(&a), safe_id(&b));
        }

        #[test]
        fn prop_created_journal_reads_back(id in arb_agent_id()) {
            let dir = tempfile::tempdir().unwrap();
            let store = JournalStore::new(dir.path());
            let record = store.create(&id, "developer", "1", "s1").unwrap();
            prop_assert_eq!(store.read(&id), Some(record));
            prop_assert_eq!(store.read_all(Some("s1")).len(), 1);
        }
    }
}
