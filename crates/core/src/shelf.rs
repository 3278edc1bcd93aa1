use std::sync::Arc;

use crate::error::CoreResult;
use crate::events::EventBus;
use crate::pagination::{Page, PageLimits, PageRequest};
use crate::source::{DisabledEnhancer, SourceProvider, SourceProviders, SpecEnhancer};
use crate::store::Store;
use crate::versioning::{RetentionPolicy, VersioningEngine};

/// The service facade. Cheap to clone; every entity operation is an
/// `impl Shelf` block in its own module.
#[derive(Clone)]
pub struct Shelf {
    inner: Arc<ShelfInner>,
}

struct ShelfInner {
    store: Arc<dyn Store>,
    engine: VersioningEngine,
    bus: EventBus,
    providers: SourceProviders,
    enhancer: Arc<dyn SpecEnhancer>,
    page_limits: PageLimits,
}

impl Shelf {
    pub fn builder(store: Arc<dyn Store>) -> ShelfBuilder {
        ShelfBuilder::new(store)
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub fn engine(&self) -> &VersioningEngine {
        &self.inner.engine
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn providers(&self) -> &SourceProviders {
        &self.inner.providers
    }

    pub fn enhancer(&self) -> &dyn SpecEnhancer {
        self.inner.enhancer.as_ref()
    }

    pub fn page_limits(&self) -> PageLimits {
        self.inner.page_limits
    }

    /// Validate raw pagination parameters against the configured limits.
    pub fn page(&self, request: PageRequest) -> CoreResult<Page> {
        Page::resolve(request, self.inner.page_limits)
    }

    pub async fn ping(&self) -> CoreResult<()> {
        Ok(self.store().ping().await?)
    }
}

impl std::fmt::Debug for Shelf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shelf")
            .field("engine", &self.inner.engine)
            .field("providers", &self.inner.providers)
            .field("page_limits", &self.inner.page_limits)
            .finish_non_exhaustive()
    }
}

pub struct ShelfBuilder {
    store: Arc<dyn Store>,
    retention: RetentionPolicy,
    bus: Option<EventBus>,
    providers: SourceProviders,
    enhancer: Arc<dyn SpecEnhancer>,
    page_limits: PageLimits,
}

impl ShelfBuilder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            retention: RetentionPolicy::default(),
            bus: None,
            providers: SourceProviders::new(),
            enhancer: Arc::new(DisabledEnhancer),
            page_limits: PageLimits::default(),
        }
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.providers = self.providers.with(provider);
        self
    }

    pub fn enhancer(mut self, enhancer: Arc<dyn SpecEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn page_limits(mut self, limits: PageLimits) -> Self {
        self.page_limits = limits;
        self
    }

    pub fn build(self) -> Shelf {
        Shelf {
            inner: Arc::new(ShelfInner {
                store: self.store,
                engine: VersioningEngine::new(self.retention),
                bus: self.bus.unwrap_or_default(),
                providers: self.providers,
                enhancer: self.enhancer,
                page_limits: self.page_limits,
            }),
        }
    }
}
