//! Interpretation of WordPress JSON API responses.
//!
//! The API reports a missing route or item with an error envelope instead of
//! an item, and depending on the plugin version that envelope is either an
//! object or an array holding one object. An envelope carries `code` and
//! `message` and never an id, so content that happens to have a `code`
//! attribute is still content. Listings are plain arrays.

use serde_json::{Map, Value};

use super::types::{RecordFields, RemoteId};

/// What a single-item response turned out to be.
#[derive(Debug, PartialEq)]
pub enum ItemResponse<'a> {
  /// A content item
  Item(&'a Map<String, Value>),
  /// An error envelope carrying a `code`
  Envelope { code: &'a str },
  /// Neither of the above
  Unexpected(&'static str),
}

/// Classify the body returned for `/{type}/{id}`.
pub fn classify_item(body: &Value) -> ItemResponse<'_> {
  if let Some(code) = envelope_code(body) {
    return ItemResponse::Envelope { code };
  }

  match body {
    Value::Object(obj) => ItemResponse::Item(obj),
    Value::Array(_) => ItemResponse::Unexpected("expected an object, got an array"),
    Value::Null => ItemResponse::Unexpected("expected an object, got null"),
    _ => ItemResponse::Unexpected("expected an object, got a scalar"),
  }
}

/// Borrow the items of a listing page.
pub fn listing_items(body: &Value) -> Result<&[Value], String> {
  if let Some(code) = envelope_code(body) {
    return Err(format!("remote returned error code '{}'", code));
  }

  body
    .as_array()
    .map(Vec::as_slice)
    .ok_or_else(|| "expected a JSON array of items".to_string())
}

/// Extract the error code of an envelope, if the body is one.
fn envelope_code(body: &Value) -> Option<&str> {
  let obj = match body {
    Value::Object(obj) => obj,
    Value::Array(items) if items.len() == 1 => items[0].as_object()?,
    _ => return None,
  };

  if obj.contains_key("ID") || obj.contains_key("id") || !obj.contains_key("message") {
    return None;
  }
  obj.get("code").and_then(Value::as_str)
}

/// Identifier of a listing item. Older API versions use `ID`, newer ones `id`.
pub fn item_id(item: &Value) -> Option<RemoteId> {
  item
    .get("ID")
    .or_else(|| item.get("id"))
    .and_then(RemoteId::from_json)
}

/// Default field mapping for posts and pages.
pub fn map_post_fields(json: &Value) -> RecordFields {
  RecordFields {
    slug: text(json.get("slug")),
    title: text(json.get("title")),
    status: text(json.get("status")),
    content: text(json.get("content")),
    excerpt: text(json.get("excerpt")),
    acf_fields: json
      .get("acf_fields")
      .or_else(|| json.get("acf"))
      .and_then(Value::as_object)
      .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
    author_id: json.get("author").and_then(author_ref),
    published_at: text(json.get("date")),
    menu_order: json.get("menu_order").and_then(Value::as_i64),
  }
}

/// Text attributes are plain strings in v1 and `{"rendered": "..."}` in v2.
fn text(value: Option<&Value>) -> Option<String> {
  let value = value?;

  if let Some(s) = value.as_str() {
    return Some(s.to_string());
  }

  value
    .get("rendered")
    .and_then(Value::as_str)
    .map(String::from)
}

/// The author is either an id or an embedded user object.
fn author_ref(value: &Value) -> Option<RemoteId> {
  RemoteId::from_json(value).or_else(|| {
    value
      .get("ID")
      .or_else(|| value.get("id"))
      .and_then(RemoteId::from_json)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_object_envelope() {
    let body = json!({"code": "json_no_route", "message": "No route was found"});
    assert_eq!(
      classify_item(&body),
      ItemResponse::Envelope {
        code: "json_no_route"
      }
    );
  }

  #[test]
  fn test_array_envelope() {
    let body = json!([{"code": "json_post_invalid_type", "message": "Invalid post type"}]);
    assert_eq!(
      classify_item(&body),
      ItemResponse::Envelope {
        code: "json_post_invalid_type"
      }
    );
  }

  #[test]
  fn test_item_and_unexpected_shapes() {
    let body = json!({"ID": 3, "title": "Hello"});
    assert!(matches!(classify_item(&body), ItemResponse::Item(_)));
    assert!(matches!(
      classify_item(&json!([1, 2])),
      ItemResponse::Unexpected(_)
    ));
    assert!(matches!(
      classify_item(&json!("nope")),
      ItemResponse::Unexpected(_)
    ));
  }

  #[test]
  fn test_listing_requires_array() {
    assert_eq!(listing_items(&json!([])).unwrap().len(), 0);
    assert_eq!(listing_items(&json!([{"ID": 1}])).unwrap().len(), 1);
    assert!(listing_items(&json!({"ID": 1})).is_err());
    let err =
      listing_items(&json!({"code": "json_no_route", "message": "No route"})).unwrap_err();
    assert!(err.contains("json_no_route"));
  }

  #[test]
  fn test_code_attribute_is_not_an_envelope() {
    let coupon = json!({"ID": 5, "code": "SUMMER10", "message": "Save 10%"});
    assert!(matches!(classify_item(&coupon), ItemResponse::Item(_)));

    // no message, so not the error shape
    let bare = json!({"code": "SUMMER10", "title": "Summer"});
    assert!(matches!(classify_item(&bare), ItemResponse::Item(_)));

    let page = json!([{"ID": 5, "code": "SUMMER10"}, {"ID": 6, "code": "WINTER"}]);
    assert_eq!(listing_items(&page).unwrap().len(), 2);

    let single = json!([{"id": 5, "code": "SUMMER10", "message": "Save 10%"}]);
    assert_eq!(listing_items(&single).unwrap().len(), 1);
  }

  #[test]
  fn test_item_id_variants() {
    assert_eq!(item_id(&json!({"ID": 12})), Some(RemoteId::from(12)));
    assert_eq!(item_id(&json!({"id": "12"})), Some(RemoteId::from(12)));
    assert_eq!(item_id(&json!({"ID": 1.5})), None);
    assert_eq!(item_id(&json!({"title": "x"})), None);
  }

  #[test]
  fn test_map_v1_post() {
    let json = json!({
      "ID": 7,
      "slug": "hello-world",
      "title": "Hello world",
      "status": "publish",
      "content": "<p>Body</p>",
      "excerpt": "Body",
      "acf_fields": {"subtitle": "Sub", "rank": 2},
      "author": {"ID": 3, "name": "admin"},
      "date": "2015-03-01T10:00:00",
      "menu_order": 4
    });

    let fields = map_post_fields(&json);
    assert_eq!(fields.slug.as_deref(), Some("hello-world"));
    assert_eq!(fields.title.as_deref(), Some("Hello world"));
    assert_eq!(fields.status.as_deref(), Some("publish"));
    assert_eq!(fields.content.as_deref(), Some("<p>Body</p>"));
    assert_eq!(fields.excerpt.as_deref(), Some("Body"));
    assert_eq!(fields.author_id, Some(RemoteId::from(3)));
    assert_eq!(fields.published_at.as_deref(), Some("2015-03-01T10:00:00"));
    assert_eq!(fields.menu_order, Some(4));
    let acf = fields.acf_fields.unwrap();
    assert_eq!(acf.get("subtitle"), Some(&json!("Sub")));
  }

  #[test]
  fn test_map_v2_rendered_fields() {
    let json = json!({
      "id": 9,
      "title": {"rendered": "Rendered title"},
      "content": {"rendered": "<p>x</p>", "protected": false},
      "author": 5,
      "acf": false
    });

    let fields = map_post_fields(&json);
    assert_eq!(fields.title.as_deref(), Some("Rendered title"));
    assert_eq!(fields.content.as_deref(), Some("<p>x</p>"));
    assert_eq!(fields.author_id, Some(RemoteId::from(5)));
    assert_eq!(fields.acf_fields, None);
    assert_eq!(fields.slug, None);
  }
}
