use super::*;

fn pid(raw: u64) -> ProductId {
    ProductId::new(raw).unwrap()
}

#[test]
fn product_list_accepts_bare_array() {
    let products = parse_product_list(r#"[{"id": 3, "name": "Trail Runner", "price": 89.5}]"#).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, pid(3));
    assert_eq!(products[0].detail_str("name"), Some("Trail Runner"));
    assert_eq!(products[0].details.get("price"), Some(&serde_json::json!(89.5)));
}

#[test]
fn product_list_accepts_wrapped_object_and_product_id_alias() {
    let products = parse_product_list(r#"{"favorites": [{"productId": 8}, {"id": 9}]}"#).unwrap();
    let ids: Vec<_> = products.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![pid(8), pid(9)]);
}

#[test]
fn product_with_both_id_keys_prefers_id() {
    let products = parse_product_list(r#"[{"id": 4, "productId": 40, "name": "Court Classic"}]"#).unwrap();
    assert_eq!(products[0].id, pid(4));
    assert_eq!(products[0].details.get("productId"), Some(&serde_json::json!(40)));
    assert_eq!(products[0].detail_str("name"), Some("Court Classic"));
}

#[test]
fn product_id_key_is_not_kept_in_details() {
    let products = parse_product_list(r#"[{"productId": 8, "name": "Runner"}]"#).unwrap();
    assert_eq!(products[0].id, pid(8));
    assert!(!products[0].details.contains_key("productId"));
}

#[test]
fn product_list_rejects_malformed_bodies() {
    for body in ["", "nope", r#"{"items": []}"#, r#"[{"name": "no id"}]"#, r#"[{"id": 0}]"#] {
        assert!(matches!(parse_product_list(body), Err(ApiError::Parse(_))), "{body}");
    }
}

#[test]
fn ack_tolerates_empty_body() {
    assert_eq!(parse_ack("").unwrap(), RemoteAck::default());
    assert_eq!(parse_ack("  \n").unwrap(), RemoteAck { is_favorite: None });
}

#[test]
fn ack_reads_reported_membership() {
    assert_eq!(parse_ack(r#"{"isFavorite": true}"#).unwrap().is_favorite, Some(true));
    assert_eq!(parse_ack(r#"{"ok": true}"#).unwrap().is_favorite, None);
    assert!(matches!(parse_ack("<html>"), Err(ApiError::Parse(_))));
}

#[test]
fn favorite_request_serializes_camel_case() {
    let body = FavoriteRequest { user_identifier: "browser_1_abc", product_id: pid(42) };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        serde_json::json!({ "userIdentifier": "browser_1_abc", "productId": 42 })
    );
}

#[test]
fn error_codes_and_retryability() {
    let cases = [
        (ApiError::Request("refused".into()), "E_API_REQUEST", true),
        (ApiError::Status { status: 503, body: String::new() }, "E_API_STATUS", true),
        (ApiError::Status { status: 404, body: String::new() }, "E_API_STATUS", false),
        (ApiError::Parse("bad".into()), "E_API_PARSE", false),
        (ApiError::Timeout(Duration::from_secs(10)), "E_API_TIMEOUT", true),
        (ApiError::InvalidBaseUrl("x".into()), "E_INVALID_BASE_URL", false),
    ];
    for (err, code, retryable) in cases {
        assert_eq!(err.error_code(), code);
        assert_eq!(err.retryable(), retryable, "{err}");
    }
}

#[test]
fn timeout_message_is_human_readable() {
    let msg = ApiError::Timeout(Duration::from_secs(10)).to_string();
    assert_eq!(msg, "favorites request timed out after 10s");
}
