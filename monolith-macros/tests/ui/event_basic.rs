use monolith_domain::domain_event::{Event, SharedEvent, TypedEvent};
use monolith_macros::domain_event;
use std::sync::Arc;

#[domain_event(event_type = "orders.OrderSubmitted")]
#[derive(PartialEq)]
pub struct OrderSubmitted {
    pub order_id: String,
    pub total_amount: i64,
}

fn main() {
    let ev = OrderSubmitted::new("o-1", "o-1".to_string(), 1500);
    assert_eq!(ev.event_type().as_str(), "orders.OrderSubmitted");
    assert_eq!(ev.aggregate_id(), "o-1");
    assert_eq!(OrderSubmitted::EVENT_TYPE, *ev.event_type());

    let json = serde_json::to_value(&ev).unwrap();
    assert_eq!(json["type"], "orders.OrderSubmitted");
    assert_eq!(json["total_amount"], 1500);

    let back: OrderSubmitted = serde_json::from_value(json).unwrap();
    assert_eq!(back, ev);

    let shared: SharedEvent = Arc::new(ev);
    assert_eq!(shared.downcast_ref::<OrderSubmitted>().unwrap().total_amount, 1500);
}
