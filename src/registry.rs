//! Registry of the content types kept in the cache.
//!
//! Built once at startup from explicit `register` calls and read-only after
//! `build()`. The engine looks descriptors up by name.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;

use crate::config::ContentTypeConfig;
use crate::wp::api_types::map_post_fields;
use crate::wp::RecordFields;

/// Maps a raw remote item onto the cached fields.
pub type FieldMapper = fn(&Value) -> RecordFields;

/// Everything the engine needs to know about one content type.
#[derive(Clone)]
pub struct ContentType {
  /// Key used by callers and in the store (e.g. "post")
  pub name: String,
  /// Collection route on the API (e.g. "posts")
  pub route: String,
  /// Whether the listing must be walked page by page
  pub paginated: bool,
  pub map_fields: FieldMapper,
}

impl ContentType {
  /// Descriptor with the pluralized name as route and the post field mapping.
  pub fn new(name: impl Into<String>) -> Self {
    let name = name.into();
    Self {
      route: format!("{}s", name.to_lowercase()),
      name,
      paginated: false,
      map_fields: map_post_fields,
    }
  }

  pub fn with_route(mut self, route: impl Into<String>) -> Self {
    self.route = route.into();
    self
  }

  pub fn paginated(mut self, paginated: bool) -> Self {
    self.paginated = paginated;
    self
  }

  pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
    self.map_fields = mapper;
    self
  }
}

impl std::fmt::Debug for ContentType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ContentType")
      .field("name", &self.name)
      .field("route", &self.route)
      .field("paginated", &self.paginated)
      .finish_non_exhaustive()
  }
}

impl From<&ContentTypeConfig> for ContentType {
  fn from(config: &ContentTypeConfig) -> Self {
    let ct = ContentType::new(&config.name).paginated(config.paginated);
    match &config.route {
      Some(route) => ct.with_route(route),
      None => ct,
    }
  }
}

/// Collects descriptors before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
  types: Vec<ContentType>,
}

impl RegistryBuilder {
  pub fn register(mut self, content_type: ContentType) -> Result<Self> {
    if self.types.iter().any(|t| t.name == content_type.name) {
      return Err(eyre!(
        "Content type '{}' is already registered",
        content_type.name
      ));
    }
    self.types.push(content_type);
    Ok(self)
  }

  pub fn build(self) -> ContentTypeRegistry {
    ContentTypeRegistry { types: self.types }
  }
}

/// Read-only set of registered content types, in registration order.
#[derive(Debug, Clone)]
pub struct ContentTypeRegistry {
  types: Vec<ContentType>,
}

impl ContentTypeRegistry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::default()
  }

  /// Register every content type listed in the configuration.
  pub fn from_config(configs: &[ContentTypeConfig]) -> Result<Self> {
    configs
      .iter()
      .try_fold(Self::builder(), |builder, config| {
        builder.register(ContentType::from(config))
      })
      .map(RegistryBuilder::build)
  }

  pub fn get(&self, name: &str) -> Option<&ContentType> {
    self.types.iter().find(|t| t.name == name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ContentType> {
    self.types.iter()
  }
}
