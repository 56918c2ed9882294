//! Offline demo backend
//!
//! Seeds an in-memory service with one vendor, one restaurant and a few
//! orders, and can keep placing new orders so the live dashboard has
//! something to show without a hosted project.

use std::time::Duration;

use serde_json::json;
use store_client::{ClientResult, MemoryService};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEMO_EMAIL: &str = "vendor@test.com";
pub const DEMO_PASSWORD: &str = "Vendor123!";
pub const DEMO_RESTAURANT: &str = "R1";

const MENU: [(&str, &str, f64); 4] = [
    ("f1", "Margherita", 9.5),
    ("f2", "Quattro Formaggi", 12.0),
    ("f3", "Tiramisu", 5.5),
    ("f4", "Lemonade", 3.0),
];

pub fn demo_service() -> MemoryService {
    let service = MemoryService::new();
    service.add_account(DEMO_EMAIL, DEMO_PASSWORD, "v1");

    service.seed(
        "users",
        json!({ "id": "v1", "name": "Demo Vendor", "email": DEMO_EMAIL, "user_type_id": "vendor" }),
    );
    service.seed(
        "users",
        json!({ "id": "c1", "name": "Ana", "phone": "611 000 111", "user_type_id": "customer" }),
    );
    service.seed(
        "users",
        json!({ "id": "c2", "name": "Luis", "phone": "611 000 222", "user_type_id": "customer" }),
    );
    service.seed(
        "restaurants",
        json!({ "id": DEMO_RESTAURANT, "name": "Pizza Demo", "vendor_id": "v1" }),
    );
    for (id, title, _) in MENU {
        service.seed("foods", json!({ "id": id, "title": title, "image": null }));
    }
    service.seed(
        "variations",
        json!({ "id": "v-large", "food_id": "f1", "title": "Large", "price": 2.0 }),
    );

    seed_order(&service, "order-1", "D001", "c1", "PENDING", 21.0, "2024-05-01T12:00:00Z");
    service.seed(
        "order_items",
        json!({ "id": "oi-1", "order_id": "order-1", "food_id": "f1", "variation_id": "v-large", "quantity": 2 }),
    );
    service.seed(
        "order_item_addons",
        json!({ "id": "oa-1", "order_item_id": "oi-1", "title": "Extra basil", "price": 0.5 }),
    );

    seed_order(&service, "order-2", "D002", "c2", "ACCEPTED", 17.5, "2024-05-01T11:40:00Z");
    service.seed(
        "order_items",
        json!({ "id": "oi-2", "order_id": "order-2", "food_id": "f2", "quantity": 1 }),
    );
    service.seed(
        "order_items",
        json!({ "id": "oi-3", "order_id": "order-2", "food_id": "f3", "quantity": 1 }),
    );

    seed_order(&service, "order-0", "D000", "c1", "DELIVERED", 9.5, "2024-05-01T09:00:00Z");
    service
}

fn seed_order(
    service: &MemoryService,
    id: &str,
    code: &str,
    customer: &str,
    status: &str,
    amount: f64,
    created_at: &str,
) {
    service.seed(
        "orders",
        json!({
            "id": id,
            "order_id": code,
            "restaurant_id": DEMO_RESTAURANT,
            "user_id": customer,
            "rider_id": null,
            "order_status": status,
            "order_amount": amount,
            "delivery_address_text": "Calle Mayor 1",
            "created_at": created_at,
        }),
    );
}

/// Place the `n`-th simulated order, the way a customer app would
pub fn place_order(service: &MemoryService, n: usize) -> ClientResult<String> {
    let (food_id, _, price) = MENU[n % MENU.len()];
    let quantity = (n % 3 + 1) as u32;
    let id = format!("sim-{}", uuid::Uuid::new_v4());
    let code = format!("S{:03}", n % 1000);

    service.seed(
        "order_items",
        json!({ "id": format!("{id}-item"), "order_id": id, "food_id": food_id, "quantity": quantity }),
    );
    service.insert_external(
        "orders",
        json!({
            "id": id,
            "order_id": code,
            "restaurant_id": DEMO_RESTAURANT,
            "user_id": if n % 2 == 0 { "c1" } else { "c2" },
            "rider_id": null,
            "order_status": "PENDING",
            "order_amount": price * f64::from(quantity),
            "delivery_address_text": "Plaza Nueva 3",
        }),
    )?;
    Ok(code)
}

/// Place a new order every `every` until cancelled
pub fn spawn_simulator(
    service: MemoryService,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately
        ticker.tick().await;
        let mut n = 1;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match place_order(&service, n) {
                        Ok(code) => tracing::debug!(code = %code, "Simulated order placed"),
                        Err(e) => tracing::warn!("Simulated order failed: {e}"),
                    }
                    n += 1;
                }
            }
        }
    })
}
