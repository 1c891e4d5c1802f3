use std::{sync::Arc, time::Duration};

use agrimarket::{
    conversations::Participant,
    listings::{Listing, ListingDraft},
    roles::Role,
};
use agrimarket_app::{
    auth::FileRoleCache,
    config::AppConfig,
    context::{AppContext, MemoryBackends},
};
use tokio::time::{Instant, sleep};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) async fn run(config: &AppConfig) -> Result<(), String> {
    let memory = MemoryBackends::new();
    let compression = config.images.compression();

    let farmer_cache = FileRoleCache::new(config.session.role_cache_path.clone());
    let farmer_app = AppContext::new(memory.session_with_cache(Arc::new(farmer_cache)), compression);
    let buyer_app = AppContext::new(memory.session(), compression);

    let farmer = farmer_app
        .auth
        .sign_up("ravi@example.com", "secret1", "Ravi Kumar", Role::Farmer)
        .await
        .map_err(|error| format!("farmer sign-up failed: {error}"))?;

    wait_until("farmer subscription", || farmer_app.listings.is_subscribed()).await?;

    let pending = farmer_app
        .listings
        .create_listing(ListingDraft {
            title: "Rice Husk".to_string(),
            quantity: "500".to_string(),
            unit: "kg".to_string(),
            price: "5".to_string(),
            description: "Dry husk from this season's harvest".to_string(),
            availability: "Immediate".to_string(),
            quality: "Good".to_string(),
            confidence: Some(92),
            location: "Ludhiana, Punjab".to_string(),
            image: None,
        })
        .map_err(|error| format!("failed to create listing: {error}"))?;

    print_listings("my listings, write in flight", &farmer_app.listings.my_listings());

    let listing = pending
        .persisted()
        .await
        .map_err(|error| format!("listing write failed: {error}"))?;

    let buyer = buyer_app
        .auth
        .sign_up(
            "procurement@greenfuel.example",
            "secret1",
            "GreenFuel Biomass",
            Role::Buyer,
        )
        .await
        .map_err(|error| format!("buyer sign-up failed: {error}"))?;

    wait_until("listing in the marketplace", || {
        buyer_app
            .listings
            .marketplace_listings()
            .iter()
            .any(|l| l.id == listing.id)
    })
    .await?;

    buyer_app
        .listings
        .toggle_bookmark(listing.id)
        .map_err(|error| format!("failed to bookmark listing: {error}"))?;

    print_listings("marketplace", &buyer_app.listings.marketplace_listings());
    print_listings("bookmarked", &buyer_app.listings.bookmarked_listings());

    let message = buyer_app
        .messaging
        .send_message(
            Participant {
                id: buyer.id,
                role: Role::Buyer,
                name: "GreenFuel Biomass".to_string(),
            },
            Participant {
                id: farmer.id,
                role: Role::Farmer,
                name: listing.farmer_name.clone(),
            },
            "Is the rice husk still available? We can collect next week.",
        )
        .await
        .map_err(|error| format!("failed to send message: {error}"))?;

    let conversation = farmer_app
        .messaging
        .accept_request(farmer.id, &message.conversation_id)
        .await
        .map_err(|error| format!("failed to accept request: {error}"))?;

    farmer_app
        .messaging
        .mark_read(farmer.id, &conversation.id)
        .await
        .map_err(|error| format!("failed to mark conversation read: {error}"))?;

    println!("== conversation {} ({:?})", conversation.id, conversation.status);

    let messages = farmer_app
        .messaging
        .messages_for(&conversation.id)
        .await
        .map_err(|error| format!("failed to load messages: {error}"))?;

    for message in messages {
        println!("  [{}] {}", message.sender_role, message.body);
    }

    farmer_app
        .listings
        .withdraw_listing(listing.id)
        .await
        .map_err(|error| format!("failed to withdraw listing: {error}"))?;

    wait_until("withdrawal to reach the marketplace", || {
        buyer_app.listings.marketplace_listings().is_empty()
    })
    .await?;

    print_listings("marketplace after withdrawal", &buyer_app.listings.marketplace_listings());
    print_listings("bookmarked after withdrawal", &buyer_app.listings.bookmarked_listings());

    for app in [&farmer_app, &buyer_app] {
        app.auth
            .sign_out()
            .await
            .map_err(|error| format!("sign-out failed: {error}"))?;
    }

    Ok(())
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) -> Result<(), String> {
    let deadline = Instant::now() + WAIT_TIMEOUT;

    while !condition() {
        if Instant::now() >= deadline {
            return Err(format!("timed out waiting for {what}"));
        }

        sleep(POLL_INTERVAL).await;
    }

    Ok(())
}

fn print_listings(heading: &str, listings: &[Listing]) {
    println!("== {heading} ({})", listings.len());

    for listing in listings {
        println!(
            "  {} {} | {} {} @ {} | {}{}{}",
            listing.id,
            listing.title,
            listing.quantity,
            listing.unit,
            listing.price,
            listing.status,
            if listing.is_unconfirmed() { " | pending" } else { "" },
            if listing.is_bookmarked { " | bookmarked" } else { "" },
        );
    }
}
