//! Well-known framework type and annotation names.
//!
//! Both the `javax.inject` and `jakarta.inject` spellings are accepted wherever
//! the framework does, and bare simple names are accepted so that hand-written
//! declaration files can stay short.

pub const PROVIDER: &[&str] = &["javax.inject.Provider", "jakarta.inject.Provider", "Provider"];
pub const LAZY: &[&str] = &["dagger.Lazy", "Lazy"];
pub const PRODUCER: &[&str] = &["dagger.producers.Producer", "Producer"];
pub const PRODUCED: &[&str] = &["dagger.producers.Produced", "Produced"];
pub const FUTURE: &[&str] = &["com.google.common.util.concurrent.ListenableFuture", "ListenableFuture"];
pub const MEMBERS_INJECTOR: &[&str] = &["dagger.MembersInjector", "MembersInjector"];
pub const OPTIONAL: &[&str] = &["java.util.Optional", "com.google.common.base.Optional", "Optional"];
pub const SET: &[&str] = &["java.util.Set", "Set"];
pub const MAP: &[&str] = &["java.util.Map", "Map"];

pub const SINGLETON: &[&str] = &["javax.inject.Singleton", "jakarta.inject.Singleton", "Singleton"];
pub const REUSABLE: &[&str] = &["dagger.Reusable", "Reusable"];
pub const PRODUCTION_SCOPE: &[&str] = &["dagger.producers.ProductionScope", "ProductionScope"];

pub const INJECT: &[&str] = &["javax.inject.Inject", "jakarta.inject.Inject", "Inject"];
pub const PROVIDES: &[&str] = &["dagger.Provides", "Provides"];
pub const PRODUCES: &[&str] = &["dagger.producers.Produces", "Produces"];
pub const BINDS: &[&str] = &["dagger.Binds", "Binds"];
pub const BINDS_OPTIONAL_OF: &[&str] = &["dagger.BindsOptionalOf", "BindsOptionalOf"];
pub const MULTIBINDS: &[&str] = &["dagger.multibindings.Multibinds", "Multibinds"];
pub const INTO_SET: &[&str] = &["dagger.multibindings.IntoSet", "IntoSet"];
pub const ELEMENTS_INTO_SET: &[&str] = &["dagger.multibindings.ElementsIntoSet", "ElementsIntoSet"];
pub const INTO_MAP: &[&str] = &["dagger.multibindings.IntoMap", "IntoMap"];
pub const BINDS_INSTANCE: &[&str] = &["dagger.BindsInstance", "BindsInstance"];

/// Matches any annotation whose simple name is `Nullable`, regardless of package.
pub fn is_nullable_annotation(name: &str) -> bool {
    simple_name(name) == "Nullable"
}

pub fn is_one_of(name: &str, candidates: &[&str]) -> bool {
    candidates.contains(&name)
}

pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
