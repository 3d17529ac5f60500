//! Strategy evaluation: turning a request into a schema constraint.
//!
//! A [`RequestClassifier`] looks only at request-visible data (headers, URI,
//! method) and names the schema that must serve the request. It never sees
//! the registry, so it cannot depend on schema internals.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderName;
use http::request::Parts;

/// Name used for the strategy when none is given.
pub const DEFAULT_STRATEGY_NAME: &str = "dynamic-schema";

/// The constraint value derived from a request.
///
/// `Many` carries candidates in preference order: the first one with a
/// registered route wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Constraint {
    /// Nothing was derived.
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Constraint {
    /// Collapse empty derivations into [`Constraint::None`].
    ///
    /// Empty strings inside `Many` are dropped; a `Many` left empty is `None`.
    pub fn normalize(self) -> Self {
        match self {
            Constraint::One(value) if value.is_empty() => Constraint::None,
            Constraint::Many(values) => {
                let values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
                if values.is_empty() {
                    Constraint::None
                } else {
                    Constraint::Many(values)
                }
            }
            other => other,
        }
    }

    /// Whether a value was derived at all.
    pub fn is_derived(&self) -> bool {
        !matches!(self, Constraint::None)
    }

    /// Derived values in preference order.
    pub fn values(&self) -> &[String] {
        match self {
            Constraint::None => &[],
            Constraint::One(value) => std::slice::from_ref(value),
            Constraint::Many(values) => values,
        }
    }
}

impl From<String> for Constraint {
    fn from(value: String) -> Self {
        Constraint::One(value)
    }
}

impl From<&str> for Constraint {
    fn from(value: &str) -> Self {
        Constraint::One(value.to_string())
    }
}

impl From<Option<String>> for Constraint {
    fn from(value: Option<String>) -> Self {
        value.map(Constraint::One).unwrap_or_default()
    }
}

impl From<Option<&str>> for Constraint {
    fn from(value: Option<&str>) -> Self {
        value.map(Constraint::from).unwrap_or_default()
    }
}

impl From<Vec<String>> for Constraint {
    fn from(values: Vec<String>) -> Self {
        Constraint::Many(values)
    }
}

impl From<Vec<&str>> for Constraint {
    fn from(values: Vec<&str>) -> Self {
        Constraint::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Maps an inbound request to the schema constraint it must be routed by.
///
/// Implementations must be deterministic for a given request: classifying
/// the same request twice must yield the same constraint.
#[async_trait]
pub trait RequestClassifier: Send + Sync {
    async fn derive(&self, request: &Parts) -> Constraint;
}

/// Classifier backed by a plain function or closure.
///
/// Built with [`classifier_fn`]; the closure may return anything convertible
/// into a [`Constraint`] (`String`, `&str`, `Option<String>`, `Vec<String>`).
pub struct FnClassifier<F, C> {
    f: F,
    _output: PhantomData<fn() -> C>,
}

/// Turn a closure into a [`RequestClassifier`].
pub fn classifier_fn<F, C>(f: F) -> FnClassifier<F, C>
where
    F: Fn(&Parts) -> C + Send + Sync,
    C: Into<Constraint>,
{
    FnClassifier {
        f,
        _output: PhantomData,
    }
}

#[async_trait]
impl<F, C> RequestClassifier for FnClassifier<F, C>
where
    F: Fn(&Parts) -> C + Send + Sync,
    C: Into<Constraint>,
{
    async fn derive(&self, request: &Parts) -> Constraint {
        (self.f)(request).into()
    }
}

/// Classifier reading the schema name from a request header.
#[derive(Debug, Clone)]
pub struct HeaderClassifier {
    header: HeaderName,
}

impl HeaderClassifier {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

#[async_trait]
impl RequestClassifier for HeaderClassifier {
    async fn derive(&self, request: &Parts) -> Constraint {
        request
            .headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim())
            .into()
    }
}

/// A named classifier plus its matching policy.
#[derive(Clone)]
pub struct StrategyDescriptor {
    name: String,
    classifier: Arc<dyn RequestClassifier>,
    must_match_when_derived: bool,
}

impl StrategyDescriptor {
    /// Wrap a classifier. Derived constraints must match by default.
    pub fn new(classifier: impl RequestClassifier + 'static) -> Self {
        Self::from_arc(Arc::new(classifier))
    }

    /// Wrap a closure, see [`classifier_fn`].
    pub fn from_fn<F, C>(f: F) -> Self
    where
        F: Fn(&Parts) -> C + Send + Sync + 'static,
        C: Into<Constraint> + 'static,
    {
        Self::new(classifier_fn(f))
    }

    pub fn from_arc(classifier: Arc<dyn RequestClassifier>) -> Self {
        Self {
            name: DEFAULT_STRATEGY_NAME.to_string(),
            classifier,
            must_match_when_derived: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// When `false`, a derived constraint with no matching route falls back
    /// to the first route registered at the path instead of failing.
    pub fn with_must_match_when_derived(mut self, must_match: bool) -> Self {
        self.must_match_when_derived = must_match;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn must_match_when_derived(&self) -> bool {
        self.must_match_when_derived
    }

    /// Run the classifier and normalize its output.
    pub async fn derive(&self, request: &Parts) -> Constraint {
        self.classifier.derive(request).await.normalize()
    }
}

impl fmt::Debug for StrategyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyDescriptor")
            .field("name", &self.name)
            .field("must_match_when_derived", &self.must_match_when_derived)
            .finish()
    }
}
