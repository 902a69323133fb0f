//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use fcommon::{MetadataMap, RequestParameters, SessionId, new_call_id};
//!
//! let session = SessionId::from("session-1");
//! let mut metadata = MetadataMap::new();
//! metadata.insert("tenant".to_string(), "acme".to_string());
//!
//! let params = RequestParameters::default().with_temperature(0.3).enable_streaming();
//! assert_eq!(session.as_str(), "session-1");
//! assert_eq!(params.stream, Some(true));
//! assert!(new_call_id().starts_with("call_"));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use fcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Session identifiers, metadata maps, and short call identifiers.
    //!
    //! ```rust
    //! use fcommon::{SessionId, new_call_id};
    //!
    //! let session = SessionId::new("session-42");
    //! assert_eq!(session.to_string(), "session-42");
    //!
    //! let first = new_call_id();
    //! let second = new_call_id();
    //! assert_ne!(first, second);
    //! ```

    use std::collections::HashMap;
    use std::fmt::{Display, Formatter};

    use uuid::Uuid;

    pub type MetadataMap = HashMap<String, String>;

    const CALL_ID_LEN: usize = 12;

    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SessionId(String);

    impl SessionId {
        pub fn new(value: impl Into<String>) -> Self {
            Self(value.into())
        }

        /// Random identifier for sessions created without one.
        pub fn generate() -> Self {
            Self(Uuid::new_v4().to_string())
        }

        pub fn as_str(&self) -> &str {
            self.0.as_str()
        }
    }

    impl Display for SessionId {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<String> for SessionId {
        fn from(value: String) -> Self {
            Self(value)
        }
    }

    impl From<&str> for SessionId {
        fn from(value: &str) -> Self {
            Self(value.to_string())
        }
    }

    /// Generates the identifier attached to a tool call when it enters a transcript.
    pub fn new_call_id() -> String {
        let raw = Uuid::new_v4().simple().to_string();
        format!("call_{}", &raw[..CALL_ID_LEN])
    }
}

pub mod model {
    //! Completion request knobs shared by every layer that can set them.
    //!
    //! Every field is optional. A value that is unset, or set to an empty
    //! string/list/object, means "leave it out of the outbound payload".
    //!
    //! ```rust
    //! use fcommon::RequestParameters;
    //!
    //! let call = RequestParameters::default().with_temperature(0.9);
    //! let session = RequestParameters::default()
    //!     .with_temperature(0.5)
    //!     .with_max_tokens(128);
    //!
    //! let merged = call.or(&session);
    //! assert_eq!(merged.temperature, Some(0.9));
    //! assert_eq!(merged.max_tokens, Some(128));
    //! ```

    use serde::{Deserialize, Serialize};
    use serde_json::{Map, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ResponseFormat {
        Text,
        JsonObject,
        JsonSchema { json_schema: Value },
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct RequestParameters {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_tokens: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_completion_tokens: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub top_p: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub top_k: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub min_p: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub top_a: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub frequency_penalty: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub presence_penalty: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub repetition_penalty: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub seed: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub stop: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub logit_bias: Option<Map<String, Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub logprobs: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub top_logprobs: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub response_format: Option<ResponseFormat>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub tool_choice: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub parallel_tool_calls: Option<bool>,
        /// Provider routing hints, forwarded verbatim as the `provider` object.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub provider: Option<Map<String, Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub transforms: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub route: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub prediction: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub stream: Option<bool>,
    }

    macro_rules! layer_fields {
        ($upper:expr, $lower:expr; $($field:ident),+ $(,)?) => {
            RequestParameters {
                $($field: pick(&$upper.$field, &$lower.$field)),+
            }
        };
    }

    macro_rules! drop_blank_fields {
        ($params:expr; $($field:ident),+ $(,)?) => {
            $(
                if $params.$field.as_ref().is_some_and(Blank::is_blank) {
                    $params.$field = None;
                }
            )+
        };
    }

    impl RequestParameters {
        /// Returns a copy where every field set on `self` wins and unset fields
        /// fall through to `lower`.
        pub fn or(&self, lower: &RequestParameters) -> RequestParameters {
            layer_fields!(self, lower;
                model, temperature, max_tokens, max_completion_tokens, top_p, top_k,
                min_p, top_a, frequency_penalty, presence_penalty, repetition_penalty,
                seed, stop, logit_bias, logprobs, top_logprobs, response_format,
                tool_choice, parallel_tool_calls, provider, transforms, route,
                prediction, stream,
            )
        }

        /// Clears every field whose value is blank so it is omitted downstream.
        pub fn without_blanks(mut self) -> RequestParameters {
            drop_blank_fields!(self;
                model, temperature, max_tokens, max_completion_tokens, top_p, top_k,
                min_p, top_a, frequency_penalty, presence_penalty, repetition_penalty,
                seed, stop, logit_bias, logprobs, top_logprobs, response_format,
                tool_choice, parallel_tool_calls, provider, transforms, route,
                prediction, stream,
            );
            self
        }

        pub fn is_empty(&self) -> bool {
            self.clone().without_blanks() == RequestParameters::default()
        }

        pub fn with_model(mut self, model: impl Into<String>) -> Self {
            self.model = Some(model.into());
            self
        }

        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }

        pub fn with_top_p(mut self, top_p: f32) -> Self {
            self.top_p = Some(top_p);
            self
        }

        pub fn with_seed(mut self, seed: i64) -> Self {
            self.seed = Some(seed);
            self
        }

        pub fn with_stop(mut self, stop: impl IntoIterator<Item = impl Into<String>>) -> Self {
            self.stop = Some(stop.into_iter().map(Into::into).collect());
            self
        }

        pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
            self.response_format = Some(format);
            self
        }

        pub fn with_tool_choice(mut self, tool_choice: Value) -> Self {
            self.tool_choice = Some(tool_choice);
            self
        }

        pub fn with_provider_hint(mut self, key: impl Into<String>, value: Value) -> Self {
            self.provider
                .get_or_insert_with(Map::new)
                .insert(key.into(), value);
            self
        }

        pub fn with_streaming(mut self, stream: bool) -> Self {
            self.stream = Some(stream);
            self
        }

        pub fn enable_streaming(self) -> Self {
            self.with_streaming(true)
        }
    }

    fn pick<T>(upper: &Option<T>, lower: &Option<T>) -> Option<T>
    where
        T: Blank + Clone,
    {
        match upper {
            Some(value) if !value.is_blank() => Some(value.clone()),
            _ => lower.clone(),
        }
    }

    trait Blank {
        fn is_blank(&self) -> bool;
    }

    impl Blank for String {
        fn is_blank(&self) -> bool {
            self.trim().is_empty()
        }
    }

    impl<T> Blank for Vec<T> {
        fn is_blank(&self) -> bool {
            self.is_empty()
        }
    }

    impl Blank for Map<String, Value> {
        fn is_blank(&self) -> bool {
            self.is_empty()
        }
    }

    impl Blank for Value {
        fn is_blank(&self) -> bool {
            match self {
                Value::Null => true,
                Value::String(text) => text.trim().is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(fields) => fields.is_empty(),
                Value::Bool(_) | Value::Number(_) => false,
            }
        }
    }

    impl Blank for ResponseFormat {
        fn is_blank(&self) -> bool {
            false
        }
    }

    macro_rules! never_blank {
        ($($ty:ty),+) => {
            $(impl Blank for $ty {
                fn is_blank(&self) -> bool {
                    false
                }
            })+
        };
    }

    never_blank!(f32, u32, i64, bool);
}

pub mod registry {
    //! Insertion-ordered registry used by function and provider tables.
    //!
    //! ```rust
    //! use fcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("beta".to_string(), 2_u32);
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert_eq!(registry.values().copied().collect::<Vec<_>>(), vec![2, 1]);
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        order: Vec<K>,
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                order: Vec::new(),
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash + Clone,
    {
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts or replaces a value. A replaced key keeps its original position.
        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            let previous = self.items.insert(key.clone(), value);
            if previous.is_none() {
                self.order.push(key);
            }
            previous
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            let removed = self.items.remove(key)?;
            self.order.retain(|candidate| {
                let candidate: &Q = candidate.borrow();
                candidate != key
            });
            Some(removed)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn keys(&self) -> impl Iterator<Item = &K> {
            self.order.iter()
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.order.iter().filter_map(|key| self.items.get(key))
        }

        pub fn len(&self) -> usize {
            self.order.len()
        }

        pub fn is_empty(&self) -> bool {
            self.order.is_empty()
        }
    }
}

pub use context::{MetadataMap, SessionId, new_call_id};
pub use future::BoxFuture;
pub use model::{RequestParameters, ResponseFormat};
pub use registry::Registry;
