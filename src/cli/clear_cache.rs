use crate::core::launcher::LauncherSession;

/// Clears all cached art, or with `backgrounds` only moves background art
/// to a new cache version so it is fetched again.
pub fn execute(session: &LauncherSession, backgrounds: bool) {
    log::debug!("clear-cache command: backgrounds={}", backgrounds);
    if backgrounds {
        session.rebuild_backgrounds();
    } else {
        session.clear_image_cache();
    }
    if let Some(status) = session.status_message() {
        println!("✅ {}", status);
    }
    println!(
        "Background art version {}",
        session.settings().background_cache_version()
    );
    session.store().flush();
}
