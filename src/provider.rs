//! Providers: how each component is constructed, what it exposes, and which
//! lifecycle hooks it declares.
//!
//! A provider is built with [`ProviderBuilder`] and handed to
//! [`Harness::provide`](crate::Harness::provide). Every provider must declare
//! its dependencies explicitly, either with one or more [`param`](ProviderBuilder::param)
//! calls or with [`no_dependencies`](ProviderBuilder::no_dependencies).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::cancellation::InterruptToken;
use crate::error::{BoxError, JabError, JabResult};
use crate::key::{short_name_of, TypeKey};
use crate::signature::{Component, Param, Shape, TypeRef};

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Result returned by lifecycle hooks.
pub type HookResult = Result<(), BoxError>;

/// Lifecycle hook names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    OnStart,
    Run,
    OnStop,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::OnStart => "on_start",
            HookKind::Run => "run",
            HookKind::OnStop => "on_stop",
        })
    }
}

/// How a provider produces its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Synchronous constructor, named after the constructed type.
    Constructor,
    /// Possibly asynchronous factory, named after its declared return type.
    Factory,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Constructor => "constructor",
            ProviderKind::Factory => "factory",
        })
    }
}

type Caster = Arc<dyn Fn(AnyArc) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Casts from a concrete instance to the trait objects it is exposed as.
#[derive(Clone, Default)]
pub(crate) struct ViewTable {
    casters: HashMap<TypeId, (TypeKey, Caster)>,
}

impl ViewTable {
    pub(crate) fn insert<T, C>(&mut self, cast: fn(Arc<T>) -> Arc<C>)
    where
        T: Any + Send + Sync,
        C: ?Sized + Send + Sync + 'static,
    {
        let caster: Caster = Arc::new(move |instance: AnyArc| {
            instance
                .downcast::<T>()
                .ok()
                .map(|this| Box::new(cast(this)) as Box<dyn Any + Send + Sync>)
        });
        self.casters.insert(TypeId::of::<C>(), (TypeKey::of::<C>(), caster));
    }

    pub(crate) fn contains(&self, key: &TypeKey) -> bool {
        self.casters.contains_key(&key.id())
    }

    pub(crate) fn view<C: ?Sized + Send + Sync + 'static>(&self, instance: &AnyArc) -> Option<Arc<C>> {
        let (_, caster) = self.casters.get(&TypeId::of::<C>())?;
        caster(instance.clone())?
            .downcast::<Arc<C>>()
            .ok()
            .map(|boxed| *boxed)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.casters.values().map(|(key, _)| key)
    }
}

/// A constructed instance together with the views its provider exposes.
#[derive(Clone)]
pub struct Injected {
    name: String,
    instance: AnyArc,
    views: Arc<ViewTable>,
}

impl Injected {
    pub(crate) fn new(name: impl Into<String>, instance: AnyArc, views: Arc<ViewTable>) -> Self {
        Self {
            name: name.into(),
            instance,
            views,
        }
    }

    /// Name of the provider that produced this instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &AnyArc {
        &self.instance
    }

    /// The instance as its concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    /// The instance viewed through a capability trait object.
    pub fn view<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.views.view::<C>(&self.instance)
    }

    pub fn exposes(&self, key: &TypeKey) -> bool {
        self.views.contains(key)
    }

    /// True when both handles share the same instance.
    pub fn same_instance(&self, other: &Injected) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected")
            .field("name", &self.name)
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolved arguments for a constructor, factory or `on_start` hook.
///
/// # Examples
///
/// ```rust
/// use jab::{Component, Harness, Provider, TypeRef};
/// use std::sync::Arc;
///
/// struct Config { port: u16 }
/// impl Component for Config {}
///
/// struct Server { config: Arc<Config> }
/// impl Component for Server {}
///
/// # async fn example() -> jab::JabResult<()> {
/// let mut harness = Harness::new();
/// harness.provide(Provider::constructor(|_| Ok(Config { port: 8080 })).no_dependencies())?;
/// harness.provide(
///     Provider::constructor(|deps| Ok(Server { config: deps.get::<Config>("config")? }))
///         .param("config", TypeRef::component::<Config>()),
/// )?;
/// harness.build().await?;
/// assert_eq!(harness.environment()?.resolve::<Server>("Server")?.config.port, 8080);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dependencies {
    owner: String,
    values: Vec<(String, Injected)>,
}

impl Dependencies {
    pub(crate) fn new(owner: impl Into<String>, values: Vec<(String, Injected)>) -> Self {
        Self {
            owner: owner.into(),
            values,
        }
    }

    /// Name of the provider these dependencies were resolved for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Raw injected value for a parameter.
    pub fn instance(&self, param: &str) -> JabResult<&Injected> {
        self.values
            .iter()
            .find(|(name, _)| name == param)
            .map(|(_, injected)| injected)
            .ok_or_else(|| JabError::MissingDependency {
                provider: self.owner.clone(),
                parameter: param.to_string(),
                required: "<undeclared>".to_string(),
            })
    }

    /// Parameter as its concrete type.
    pub fn get<T: Any + Send + Sync>(&self, param: &str) -> JabResult<Arc<T>> {
        self.instance(param)?
            .downcast::<T>()
            .ok_or_else(|| self.mismatch::<T>(param))
    }

    /// Parameter viewed through a capability trait object.
    pub fn capability<C: ?Sized + Send + Sync + 'static>(&self, param: &str) -> JabResult<Arc<C>> {
        self.instance(param)?
            .view::<C>()
            .ok_or_else(|| self.mismatch::<C>(param))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Injected)> {
        self.values.iter().map(|(name, injected)| (name.as_str(), injected))
    }

    fn mismatch<T: ?Sized>(&self, param: &str) -> JabError {
        JabError::TypeMismatch {
            provider: self.owner.clone(),
            parameter: param.to_string(),
            expected: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(p, i)| (p, i.name())))
            .finish()
    }
}

type SyncCtor = Arc<dyn Fn(&Dependencies) -> Result<AnyArc, BoxError> + Send + Sync>;
type AsyncCtor = Arc<dyn Fn(Dependencies) -> BoxFuture<'static, Result<AnyArc, BoxError>> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Construct {
    Sync(SyncCtor),
    Async(AsyncCtor),
}

type AsyncHookFn =
    Arc<dyn Fn(AnyArc, Dependencies, InterruptToken) -> BoxFuture<'static, HookResult> + Send + Sync>;
type BlockingHookFn = Arc<dyn Fn(AnyArc, Dependencies) -> HookResult + Send + Sync>;

/// The two forms a lifecycle hook can take.
#[derive(Clone)]
pub(crate) enum HookFn {
    Async(AsyncHookFn),
    Blocking(BlockingHookFn),
}

#[derive(Clone)]
pub(crate) struct Hook {
    pub(crate) params: Vec<Param>,
    pub(crate) func: HookFn,
}

impl Hook {
    pub(crate) fn is_async(&self) -> bool {
        matches!(self.func, HookFn::Async(_))
    }

    pub(crate) async fn invoke(
        &self,
        instance: AnyArc,
        deps: Dependencies,
        token: InterruptToken,
    ) -> HookResult {
        match &self.func {
            HookFn::Async(f) => f(instance, deps, token).await,
            HookFn::Blocking(f) => f(instance, deps),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct HookSet {
    on_start: Option<Hook>,
    run: Option<Hook>,
    on_stop: Option<Hook>,
}

impl HookSet {
    pub(crate) fn get(&self, kind: HookKind) -> Option<&Hook> {
        match kind {
            HookKind::OnStart => self.on_start.as_ref(),
            HookKind::Run => self.run.as_ref(),
            HookKind::OnStop => self.on_stop.as_ref(),
        }
    }

    fn set(&mut self, kind: HookKind, hook: Hook) {
        match kind {
            HookKind::OnStart => self.on_start = Some(hook),
            HookKind::Run => self.run = Some(hook),
            HookKind::OnStop => self.on_stop = Some(hook),
        }
    }
}

fn downcast_failed<T>() -> BoxError {
    format!("instance is not a {}", std::any::type_name::<T>()).into()
}

struct ProviderInner {
    name: String,
    kind: ProviderKind,
    produces: TypeKey,
    shape: Arc<Shape>,
    params: Vec<Param>,
    construct: Construct,
    views: Arc<ViewTable>,
    hooks: HookSet,
}

/// A registered, validated provider. Cheap to clone.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

impl Provider {
    /// Starts a provider for `T` built by a synchronous constructor.
    ///
    /// ```rust
    /// use jab::{Component, Provider, ProviderKind};
    ///
    /// struct Database;
    /// impl Component for Database {}
    ///
    /// let provider = Provider::constructor(|_| Ok(Database)).no_dependencies().build().unwrap();
    /// assert_eq!(provider.name(), "Database");
    /// assert_eq!(provider.kind(), ProviderKind::Constructor);
    /// ```
    pub fn constructor<T, F>(constructor: F) -> ProviderBuilder<T>
    where
        T: Component,
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        ProviderBuilder::new().constructor(constructor)
    }

    /// Starts a provider for `T` built by an asynchronous factory.
    pub fn factory<T, F, Fut>(factory: F) -> ProviderBuilder<T>
    where
        T: Component,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        ProviderBuilder::new().factory(factory)
    }

    /// Produced name: the key this provider is registered under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> ProviderKind {
        self.inner.kind
    }

    /// Identity of the produced type.
    pub fn produces(&self) -> TypeKey {
        self.inner.produces
    }

    /// Declared members of the produced type.
    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    /// Declared constructor/factory parameters.
    pub fn params(&self) -> &[Param] {
        &self.inner.params
    }

    /// Whether the provider exposes a view for the given trait object key.
    pub fn exposes(&self, key: &TypeKey) -> bool {
        self.inner.views.contains(key)
    }

    pub fn has_hook(&self, kind: HookKind) -> bool {
        self.inner.hooks.get(kind).is_some()
    }

    /// Extra parameters declared by the `on_start` hook.
    pub fn start_params(&self) -> &[Param] {
        self.inner
            .hooks
            .get(HookKind::OnStart)
            .map(|h| h.params.as_slice())
            .unwrap_or(&[])
    }

    pub fn ptr_eq(&self, other: &Provider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        format!("{} {} ({})", self.inner.kind, self.inner.name, self.inner.produces.type_name())
    }

    pub(crate) fn hook(&self, kind: HookKind) -> Option<&Hook> {
        self.inner.hooks.get(kind)
    }

    pub(crate) fn views(&self) -> Arc<ViewTable> {
        self.inner.views.clone()
    }

    pub(crate) async fn construct(&self, deps: Dependencies) -> Result<AnyArc, BoxError> {
        match &self.inner.construct {
            Construct::Sync(f) => f(&deps),
            Construct::Async(f) => f(deps).await,
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("produces", &self.inner.produces)
            .field("params", &self.inner.params)
            .finish()
    }
}

/// Fluent builder for a [`Provider`] producing `T`.
pub struct ProviderBuilder<T> {
    name: Option<String>,
    kind: ProviderKind,
    shape: Option<Shape>,
    params: Option<Vec<Param>>,
    construct: Option<Construct>,
    views: ViewTable,
    hooks: HookSet,
    start_params: Vec<Param>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ProviderBuilder<T> {
    /// An empty builder. A constructor or factory must still be supplied.
    pub fn new() -> Self {
        Self {
            name: None,
            kind: ProviderKind::Constructor,
            shape: None,
            params: None,
            construct: None,
            views: ViewTable::default(),
            hooks: HookSet::default(),
            start_params: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.kind = ProviderKind::Constructor;
        self.construct = Some(Construct::Sync(Arc::new(move |deps: &Dependencies| {
            constructor(deps).map(|value| Arc::new(value) as AnyArc)
        })));
        self
    }

    pub fn factory<F, Fut>(mut self, factory: F) -> Self
    where
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        self.kind = ProviderKind::Factory;
        self.construct = Some(Construct::Async(Arc::new(move |deps: Dependencies| {
            factory(deps)
                .map(|result| result.map(|value| Arc::new(value) as AnyArc))
                .boxed()
        })));
        self
    }

    /// Factory handing out an existing shared instance.
    pub(crate) fn shared(mut self, instance: Arc<T>) -> Self {
        self.kind = ProviderKind::Factory;
        self.construct = Some(Construct::Sync(Arc::new(move |_: &Dependencies| {
            Ok(instance.clone() as AnyArc)
        })));
        self
    }

    /// Overrides the produced name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the shape declared by `T`'s [`Component`] impl.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Declares a dependency.
    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.get_or_insert_with(Vec::new).push(Param::new(name, ty));
        self
    }

    /// Declares that the provider needs nothing.
    pub fn no_dependencies(mut self) -> Self {
        self.params.get_or_insert_with(Vec::new);
        self
    }

    /// Exposes the instance as the capability trait object `C`.
    ///
    /// ```rust
    /// use jab::{Component, Provider};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Component for English {}
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    ///
    /// let provider = Provider::constructor(|_| Ok(English))
    ///     .no_dependencies()
    ///     .exposes::<dyn Greeter>(|this| this)
    ///     .build()
    ///     .unwrap();
    /// assert!(provider.exposes(&jab::TypeKey::of::<dyn Greeter>()));
    /// ```
    pub fn exposes<C>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.views.insert::<T, C>(cast);
        self
    }

    /// Declares an extra parameter for the `on_start` hook.
    pub fn start_param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.start_params.push(Param::new(name, ty));
        self
    }

    /// Asynchronous `on_start` hook. Receives the parameters declared with
    /// [`start_param`](Self::start_param).
    pub fn on_start<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<T>, Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.async_hook(HookKind::OnStart, move |this, deps, _| hook(this, deps))
    }

    /// Blocking `on_start` hook, run in place.
    pub fn on_start_blocking<F>(self, hook: F) -> Self
    where
        F: Fn(Arc<T>, Dependencies) -> HookResult + Send + Sync + 'static,
    {
        self.blocking_hook(HookKind::OnStart, hook)
    }

    /// Asynchronous `run` hook. All run hooks are driven concurrently.
    pub fn run<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<T>, InterruptToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.async_hook(HookKind::Run, move |this, _, token| hook(this, token))
    }

    /// Blocking `run` hook.
    ///
    /// `run` must be asynchronous: the run phase refuses this form with
    /// [`JabError::InvalidLifecycleMethod`] without calling it.
    pub fn run_blocking<F>(self, hook: F) -> Self
    where
        F: Fn(Arc<T>) -> HookResult + Send + Sync + 'static,
    {
        self.blocking_hook(HookKind::Run, move |this, _| hook(this))
    }

    /// Asynchronous `on_stop` hook.
    pub fn on_stop<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.async_hook(HookKind::OnStop, move |this, _, _| hook(this))
    }

    /// Blocking `on_stop` hook, run inline.
    pub fn on_stop_blocking<F>(self, hook: F) -> Self
    where
        F: Fn(Arc<T>) -> HookResult + Send + Sync + 'static,
    {
        self.blocking_hook(HookKind::OnStop, move |this, _| hook(this))
    }

    fn async_hook<F, Fut>(mut self, kind: HookKind, hook: F) -> Self
    where
        F: Fn(Arc<T>, Dependencies, InterruptToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        let func: AsyncHookFn = Arc::new(move |instance: AnyArc, deps, token| {
            match instance.downcast::<T>() {
                Ok(this) => hook(this, deps, token).boxed(),
                Err(_) => futures::future::ready(Err(downcast_failed::<T>())).boxed(),
            }
        });
        self.hooks.set(kind, Hook { params: Vec::new(), func: HookFn::Async(func) });
        self
    }

    fn blocking_hook<F>(mut self, kind: HookKind, hook: F) -> Self
    where
        F: Fn(Arc<T>, Dependencies) -> HookResult + Send + Sync + 'static,
    {
        let func: BlockingHookFn = Arc::new(move |instance: AnyArc, deps| {
            match instance.downcast::<T>() {
                Ok(this) => hook(this, deps),
                Err(_) => Err(downcast_failed::<T>()),
            }
        });
        self.hooks.set(kind, Hook { params: Vec::new(), func: HookFn::Blocking(func) });
        self
    }

    /// Validates the declaration and freezes it into a [`Provider`].
    ///
    /// Fails with [`JabError::NoConstructor`] when neither a constructor nor a
    /// factory was given, and with [`JabError::NoAnnotation`] when no
    /// dependency declaration was made or a parameter is unannotated.
    pub fn build(self) -> JabResult<Provider> {
        let name = self.name.unwrap_or_else(short_name_of::<T>);

        let Some(construct) = self.construct else {
            return Err(JabError::NoConstructor { provider: name });
        };

        let params = match self.params {
            Some(params) if params.iter().all(|p| p.ty.is_annotated()) => params,
            _ => return Err(JabError::NoAnnotation { provider: name }),
        };

        if !self.start_params.iter().all(|p| p.ty.is_annotated()) {
            return Err(JabError::NoAnnotation { provider: name });
        }

        let mut hooks = self.hooks;
        if let Some(start) = hooks.on_start.as_mut() {
            start.params = self.start_params;
        }

        let shape = self.shape.unwrap_or_else(<T as Component>::shape);

        Ok(Provider {
            inner: Arc::new(ProviderInner {
                name,
                kind: self.kind,
                produces: TypeKey::of::<T>(),
                shape: Arc::new(shape),
                params,
                construct,
                views: Arc::new(self.views),
                hooks,
            }),
        })
    }
}

impl<T: Component> Default for ProviderBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
