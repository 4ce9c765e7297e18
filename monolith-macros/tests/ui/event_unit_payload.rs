use monolith_domain::domain_event::Event;
use monolith_macros::domain_event;

#[domain_event(event_type = "users.UserActivated")]
struct UserActivated {}

fn main() {
    let ev = UserActivated::new("u-1");
    assert_eq!(ev.base().aggregate_id(), "u-1");
    assert!(!ev.event_id().is_empty());
}
