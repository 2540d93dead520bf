//! Basic usage example for the wishrank crate.

use std::sync::Arc;
use wishrank::{
    Action, CatalogItem, ItemType, ManualClock, MemoryStorage, NewSavedItem, WishlistBuilder,
};

fn main() {
    println!("=== Basic Wishlist Example ===\n");

    // Example 1: Saving and ranking
    ranking_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Hitting the rate limit
    rate_limit_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Rejected input
    validation_example();
}

fn catalog() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new("alpha-shala", "Alpha Shala", 4.5),
        CatalogItem::new("bamboo-yoga", "Bamboo Yoga", 4.4),
        CatalogItem::new("canggu-flow", "Canggu Flow", 4.1),
    ]
}

fn print_ranking(wishlist: &wishrank::Wishlist) {
    for (rank, item) in wishlist
        .sort_by_popularity_and_rating(&catalog())
        .iter()
        .enumerate()
    {
        println!(
            "   {}. {} (rating {:.1}, saves {})",
            rank + 1,
            item.name,
            item.rating,
            wishlist.popularity().item_score(&item.id)
        );
    }
}

fn ranking_example() {
    println!("1. Saving and Ranking:");

    let wishlist = WishlistBuilder::new().build();

    println!("   Listing before any saves:");
    print_ranking(&wishlist);

    // Two visitors' worth of saves for Bamboo Yoga
    let bamboo = NewSavedItem::new("bamboo-yoga", "Bamboo Yoga", "bamboo-yoga", ItemType::Studio)
        .with_location("Ubud")
        .with_rating(4.4);
    wishlist.add_to_wishlist(bamboo);
    wishlist.popularity().increment("bamboo-yoga");

    println!("\n   Listing after two saves of Bamboo Yoga:");
    print_ranking(&wishlist);

    println!("\n   Saved items:");
    for item in wishlist.wishlist_items() {
        println!("   - {} ({}) added at {}", item.name, item.item_type, item.added_at);
    }
}

fn rate_limit_example() {
    println!("2. Rate Limiting:");

    let clock = ManualClock::new(1_700_000_000_000);
    let wishlist = WishlistBuilder::new()
        .storage(Arc::new(MemoryStorage::new()))
        .clock(Arc::new(clock.clone()))
        .build();

    for i in 1..=12 {
        let item = NewSavedItem::new(
            format!("studio-{}", i),
            format!("Studio {}", i),
            format!("studio-{}", i),
            ItemType::Studio,
        );
        if wishlist.add_to_wishlist(item) {
            println!("   Save {} - ✅ Saved ({} left)", i, wishlist.remaining_actions());
        } else {
            println!("   Save {} - ❌ Rate limited", i);
        }
    }

    println!("\n{}", wishlist.limiter().status(Action::WishlistActions));

    println!("\n   One minute later...");
    clock.advance(60_001);
    println!("   Remaining actions: {}", wishlist.remaining_actions());

    println!("\n{}", wishlist.limiter().stats());
}

fn validation_example() {
    println!("3. Input Validation:");

    let wishlist = WishlistBuilder::new().build();

    let id = "../etc/passwd";
    let bad = NewSavedItem::new(id, "Sneaky", "sneaky", ItemType::Retreat);
    let outcome = if wishlist.add_to_wishlist(bad) {
        "saved"
    } else {
        "rejected"
    };
    println!("   Save with id {:?}: {}", id, outcome);

    let dirty = NewSavedItem::new(
        "jungle-retreat",
        "<b>Jungle</b> Retreat",
        "jungle",
        ItemType::Retreat,
    );
    wishlist.add_to_wishlist(dirty);
    for item in wishlist.wishlist_items() {
        println!("   Stored name after sanitizing: {:?}", item.name);
    }
}
