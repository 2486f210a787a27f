use crate::core::shared_store::SharedStore;

/// Leaves a launch request for the next session to pick up.
pub fn execute(store: &SharedStore, id: Option<String>, path: Option<String>) {
    log::debug!("queue command: id={:?} path={:?}", id, path);
    match (id, path) {
        (Some(id), _) => {
            store.set_pending_launch_id(id.as_str());
            println!("✅ Queued launch of {}", id);
        }
        (None, Some(path)) => {
            store.set_pending_launch_path(path.as_str());
            println!("✅ Queued launch of {}", path);
        }
        (None, None) => {
            println!("No launch request specified.");
            return;
        }
    }
    store.flush();
}
