use monolith_domain::aggregate_root::AggregateRoot;
use monolith_domain::domain_event::{BaseEvent, EventType};
use monolith_macros::aggregate_root;
use serde::{Deserialize, Serialize};

#[aggregate_root]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Account {
    name: String,
}

#[aggregate_root]
#[derive(Default)]
struct Plain {
    n: u32,
}

impl Account {
    fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.domain_events
            .record(BaseEvent::new(EventType::from_static("accounts.AccountRenamed"), "a-1"));
    }
}

fn main() {
    let mut acc = Account::default();
    acc.rename("x");
    assert_eq!(acc.pending_domain_events().len(), 1);

    // 事件缓冲区不参与序列化
    let json = serde_json::to_string(&acc).unwrap();
    assert_eq!(json, r#"{"name":"x"}"#);

    assert_eq!(acc.pop_domain_events().len(), 1);
    assert!(acc.pop_domain_events().is_empty());

    let mut p = Plain::default();
    p.n += 1;
    assert!(p.pop_domain_events().is_empty());
}
