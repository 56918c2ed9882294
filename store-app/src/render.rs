//! Plain-text views of the dashboard

use std::fmt::Write;

use shared::{Order, OrderStatus};

use crate::dashboard::{DashboardState, Phase, next_action};

/// "Pizza Place - 3 active orders"
pub fn header(state: &DashboardState) -> String {
    let name = state
        .restaurant
        .as_ref()
        .map(|r| r.name.as_str())
        .unwrap_or("No restaurant");
    let count = state.active_count();
    let noun = if count == 1 { "order" } else { "orders" };
    format!("{name} - {count} active {noun}")
}

/// One list row
pub fn order_line(order: &Order) -> String {
    let mut line = format!(
        "#{:<8} {:<10} {:<20} {:>8.2}  {} item(s)",
        order.order_id,
        order.order_status.label(),
        order.customer_name(),
        order.order_amount,
        order.item_count(),
    );
    if let Some(hint) = next_action(order.order_status) {
        let _ = write!(line, "  [{hint}]");
    }
    line
}

/// Full dashboard screen
pub fn dashboard(state: &DashboardState) -> String {
    let mut out = header(state);
    out.push('\n');

    match state.phase {
        Phase::LoadingProfile | Phase::LoadingOrders => {
            out.push_str("Loading...\n");
            return out;
        }
        Phase::NoRestaurant => {
            out.push_str("No restaurants found for this vendor\n");
            return out;
        }
        Phase::Refreshing => out.push_str("Refreshing...\n"),
        Phase::Idle => {}
    }

    if state.orders.is_empty() {
        out.push_str("No active orders\n");
    }
    for order in &state.orders {
        out.push_str(&order_line(order));
        if state.is_in_flight(&order.id) {
            out.push_str("  (working)");
        }
        out.push('\n');
    }
    out
}

/// Detail view: items with variation and add-ons, then the address
pub fn order_detail(order: &Order) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Order #{} ({})", order.order_id, order.order_status.label());
    let _ = writeln!(out, "Customer: {}", order.customer_name());
    if let Some(phone) = order.user.as_ref().and_then(|u| u.phone.as_deref()) {
        let _ = writeln!(out, "Phone: {phone}");
    }
    let _ = writeln!(out, "Placed: {}", order.created_at.format("%Y-%m-%d %H:%M"));

    for item in &order.items {
        let _ = write!(out, "  {} x {}", item.quantity, item.title());
        if let Some(variation) = &item.variation {
            let _ = write!(out, " ({})", variation.title);
        }
        out.push('\n');
        for addon in &item.addons {
            let title = addon.title.as_deref().unwrap_or("Add-on");
            match addon.price {
                Some(price) => {
                    let _ = writeln!(out, "      + {title} {price:.2}");
                }
                None => {
                    let _ = writeln!(out, "      + {title}");
                }
            }
        }
    }

    if let Some(address) = &order.delivery_address {
        let _ = writeln!(out, "Deliver to: {address}");
    }
    if let Some(minutes) = order.preparation_time {
        let _ = writeln!(out, "Preparation: {minutes} min");
    }
    if order.order_status == OrderStatus::Cancelled {
        if let Some(reason) = &order.reason {
            let _ = writeln!(out, "Reason: {reason}");
        }
    }
    if let Some(rider) = &order.rider {
        let _ = writeln!(out, "Rider: {}", rider.name.as_deref().unwrap_or("Assigned"));
    }
    let _ = writeln!(out, "Total: {:.2}", order.order_amount);
    out
}
