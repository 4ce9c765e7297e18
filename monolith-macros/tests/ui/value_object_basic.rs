use monolith_macros::value_object;

#[value_object]
struct Price {
    cents: i64,
    currency: String,
}

#[value_object(display = true)]
struct Sku(String);

#[value_object(debug = false)]
#[derive(Copy, serde::Serialize)]
struct Quantity(u32);

#[value_object]
#[serde(rename_all = "lowercase")]
enum Channel {
    Email,
    Sms,
}

fn main() {
    let price = Price {
        cents: 1_250,
        currency: "USD".into(),
    };
    assert!(price.clone() == price);
    assert!(format!("{price:?}").contains("1250"));

    let sku = Sku("sku-42".into());
    assert_eq!(format!("{sku}"), "sku-42");
    assert_eq!(sku.as_inner(), "sku-42");

    let qty = Quantity(3);
    let copied = qty;
    assert_eq!(*qty.as_inner() + *copied.as_inner(), 6);

    assert_eq!(serde_json::to_string(&Channel::Sms).unwrap(), "\"sms\"");
    assert!(Channel::Email != Channel::Sms);
}
