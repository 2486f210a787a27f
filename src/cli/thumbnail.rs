use crate::cli::{find_game, load_library};
use crate::core::launcher::LauncherSession;
use crate::core::thumbnails::background_cache_key;

pub fn execute(session: &LauncherSession, target: &str, background: bool) {
    log::debug!("thumbnail command: target={} background={}", target, background);
    load_library(session);

    let games = session.games();
    let Some(game) = find_game(&games, target) else {
        println!("❌ No game matching '{}'", target);
        return;
    };

    let thumbnails = session.thumbnails();
    let (found, key) = if background {
        let version = session.settings().background_cache_version();
        (
            thumbnails.fetch_background(game, version).is_some(),
            background_cache_key(game, version),
        )
    } else {
        (
            thumbnails.fetch_thumbnail(game, None).is_some(),
            game.thumbnail_key(),
        )
    };

    match thumbnails.cache().cached_path(&key).filter(|_| found) {
        Some(path) => println!("✅ Art for {}: {}", game.title(), path.display()),
        None => println!("❌ No art found for {}", game.title()),
    }
    session.store().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thumbnails::HTTP_REQUESTS;
    use crate::test_helpers::{setup_session, TEST_MUTEX};
    use crate::utils::image_cache::png_bytes;

    #[test]
    fn test_thumbnail_served_from_cache() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let (_dir, session) = setup_session(&["Kart [0100152000022000].nsp"]);
        session
            .thumbnails()
            .cache()
            .store(&png_bytes(4, 4), "0100152000022000", "png");

        HTTP_REQUESTS.lock().unwrap().clear();
        execute(&session, "0100152000022000", false);
        assert!(HTTP_REQUESTS.lock().unwrap().is_empty());
    }

    #[test]
    fn test_background_misses_hit_providers() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let (_dir, session) = setup_session(&["Kart [0100152000022000].nsp"]);

        HTTP_REQUESTS.lock().unwrap().clear();
        execute(&session, "kart", true);
        let requests = HTTP_REQUESTS.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("0100152000022000"));
    }
}
