//! Two handles over one storage, the way two browser tabs share a profile,
//! with the background sweep removing expired rate-limit windows.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wishrank::{
    Action, ItemType, MemoryStorage, NewSavedItem, RateLimitConfig, Storage, SystemClock,
    WishlistBuilder, RATE_LIMIT_KEY_PREFIX,
};

fn main() {
    let storage = MemoryStorage::new();
    let rate_limits = RateLimitConfig::default()
        .with_window_ms(500)
        .with_cleanup_interval_ms(200);

    let open_tab = || {
        WishlistBuilder::new()
            .storage(Arc::new(storage.clone()))
            .clock(Arc::new(SystemClock))
            .rate_limits(rate_limits.clone())
            .build()
    };
    let tab_a = open_tab();
    let tab_b = open_tab();

    let (sweeper, stop) = tab_a
        .limiter()
        .clone()
        .initialize()
        .expect("failed to start cleanup thread");

    let retreat = NewSavedItem::new(
        "sunrise-retreat",
        "Sunrise Retreat",
        "sunrise",
        ItemType::Retreat,
    )
    .with_location("Amed")
    .with_rating(4.8);

    println!("Tab A saves: {}", tab_a.add_to_wishlist(retreat.clone()));
    println!("Tab B sees it: {}", tab_b.is_in_wishlist("sunrise-retreat"));
    println!("Tab B saves again: {}", tab_b.add_to_wishlist(retreat));
    println!(
        "Saves counted: {}",
        tab_b.popularity().item_score("sunrise-retreat")
    );

    println!(
        "Tab B remaining actions (shared budget): {}",
        tab_b.remaining_actions()
    );

    let rate_keys = || {
        storage
            .keys()
            .unwrap_or_default()
            .into_iter()
            .filter(|k| k.starts_with(RATE_LIMIT_KEY_PREFIX))
            .count()
    };
    println!("Rate-limit windows stored: {}", rate_keys());

    thread::sleep(Duration::from_millis(900));
    println!("Rate-limit windows after sweep: {}", rate_keys());
    println!("{}", tab_a.limiter().status(Action::WishlistActions));

    println!("Tab B removes: {}", tab_b.remove_from_wishlist("sunrise-retreat"));
    println!("Tab A count: {}", tab_a.wishlist_count());

    stop.send(()).ok();
    sweeper.join().ok();
}
