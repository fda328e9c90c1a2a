//! # Service Registry & Dispatcher
//!
//! Maps `"Service.Method"` names to typed handlers.
//!
//! Each method is an ordinary Rust function taking `&S` plus up to six
//! arguments that implement [`FromValue`]. Its return type implements
//! [`IntoReturn`], which fixes the result shape once, at registration:
//!
//! | Return type            | Shape           | Wire value          |
//! |------------------------|-----------------|---------------------|
//! | `()`                   | `Void`          | `Value::Null`       |
//! | `T`                    | `Single`        | `T` as a value      |
//! | `(A, B, ..)`           | `Multiple(n)`   | `Value::List`       |
//! | `Result<R, E>`         | shape of `R`    | `R`, or `E` as text |
//!
//! `Result` can wrap any of the other shapes, so a trailing error return is
//! stripped and the remaining results are classified as usual.
//!
//! ## Example
//! ```rust
//! use network_rpc::service::registry::{Service, ServiceRegistry};
//! use network_rpc::{rpc_args, Value};
//!
//! struct Calc;
//!
//! impl Calc {
//!     fn add(&self, a: i64, b: i64) -> i64 {
//!         a + b
//!     }
//! }
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register("Calc", Service::new(Calc).method("Add", Calc::add));
//! let sum = registry.dispatch("Calc.Add", rpc_args![10i64, 20i64]).unwrap();
//! assert_eq!(sum, Value::Int(30));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::message::{split_service_method, SERVICE_METHOD_SEPARATOR};
use crate::core::value::{FromValue, IntoValue, Value};
use crate::error::{Result, RpcError};

/// What a method produces once any trailing error is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    Single,
    Multiple(usize),
}

/// Signature of a registered method, computed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    pub arity: usize,
    pub shape: ReturnShape,
    /// Whether the method has a trailing error return
    pub fallible: bool,
}

/// A method return type
pub trait IntoReturn {
    const SHAPE: ReturnShape;
    const FALLIBLE: bool = false;

    fn into_return(self) -> Result<Value>;
}

impl IntoReturn for () {
    const SHAPE: ReturnShape = ReturnShape::Void;

    fn into_return(self) -> Result<Value> {
        Ok(Value::Null)
    }
}

macro_rules! impl_single_return {
    ($($ty:ty),*) => {$(
        impl IntoReturn for $ty {
            const SHAPE: ReturnShape = ReturnShape::Single;

            fn into_return(self) -> Result<Value> {
                Ok(self.into_value())
            }
        }
    )*};
}

impl_single_return!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, Bytes, Value
);

impl<T: IntoValue> IntoReturn for Option<T> {
    const SHAPE: ReturnShape = ReturnShape::Single;

    fn into_return(self) -> Result<Value> {
        Ok(self.into_value())
    }
}

impl<T: IntoValue> IntoReturn for Vec<T> {
    const SHAPE: ReturnShape = ReturnShape::Single;

    fn into_return(self) -> Result<Value> {
        Ok(self.into_value())
    }
}

impl<T: IntoValue> IntoReturn for BTreeMap<String, T> {
    const SHAPE: ReturnShape = ReturnShape::Single;

    fn into_return(self) -> Result<Value> {
        Ok(self.into_value())
    }
}

macro_rules! impl_multiple_return {
    ($n:expr; $($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoReturn for ($($name,)+) {
            const SHAPE: ReturnShape = ReturnShape::Multiple($n);

            #[allow(non_snake_case)]
            fn into_return(self) -> Result<Value> {
                let ($($name,)+) = self;
                Ok(Value::List(vec![$($name.into_value()),+]))
            }
        }
    };
}

impl_multiple_return!(2; A, B);
impl_multiple_return!(3; A, B, C);
impl_multiple_return!(4; A, B, C, D);

impl<R: IntoReturn, E: fmt::Display> IntoReturn for std::result::Result<R, E> {
    const SHAPE: ReturnShape = R::SHAPE;
    const FALLIBLE: bool = true;

    fn into_return(self) -> Result<Value> {
        match self {
            Ok(rest) => rest.into_return(),
            Err(e) => Err(RpcError::Service(e.to_string())),
        }
    }
}

/// A function callable as a method of `S`
///
/// Implemented for `Fn(&S, A1, .., An) -> R` with `n` up to six.
pub trait Handler<S, Args>: Send + Sync + 'static {
    const ARITY: usize;
    type Output: IntoReturn;

    fn call(&self, instance: &S, args: Vec<Value>) -> Result<Value>;
}

fn argument<T: FromValue>(index: usize, value: Value) -> Result<T> {
    T::from_value(value).map_err(|e| RpcError::ArgumentMismatch(format!("argument {index}: {e}")))
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<S, F, R, $($arg,)*> Handler<S, ($($arg,)*)> for F
        where
            F: Fn(&S, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoReturn,
            $($arg: FromValue,)*
        {
            const ARITY: usize = count!($($arg)*);
            type Output = R;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, instance: &S, args: Vec<Value>) -> Result<Value> {
                if args.len() != Self::ARITY {
                    return Err(RpcError::ArgumentMismatch(format!(
                        "expected {} arguments, got {}",
                        Self::ARITY,
                        args.len()
                    )));
                }
                let mut args = args.into_iter().enumerate();
                $(
                    let $arg: $arg = match args.next() {
                        Some((index, value)) => argument(index, value)?,
                        None => return Err(RpcError::ArgumentMismatch("missing argument".into())),
                    };
                )*
                (self)(instance, $($arg),*).into_return()
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);

type Invoke = Box<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

struct Method {
    signature: MethodSignature,
    invoke: Invoke,
}

/// A registered service: one instance and its named methods
pub struct Service {
    type_name: &'static str,
    methods: HashMap<String, Method>,
}

impl Service {
    /// Start describing the methods of `instance`
    #[allow(clippy::new_ret_no_self)]
    pub fn new<S: Send + Sync + 'static>(instance: S) -> ServiceBuilder<S> {
        ServiceBuilder {
            instance: Arc::new(instance),
            methods: HashMap::new(),
        }
    }

    /// Method names in sorted order
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn signature(&self, method: &str) -> Option<MethodSignature> {
        self.methods.get(method).map(|m| m.signature)
    }

    /// Invoke `method` with positional arguments
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let entry = self
            .methods
            .get(method)
            .ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;
        (entry.invoke)(args)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("type", &self.type_name)
            .field("methods", &self.methods())
            .finish()
    }
}

/// Builder returned by [`Service::new`]
pub struct ServiceBuilder<S> {
    instance: Arc<S>,
    methods: HashMap<String, Method>,
}

impl<S: Send + Sync + 'static> ServiceBuilder<S> {
    /// Register `handler` under `name`. A repeated name replaces the earlier
    /// handler.
    pub fn method<H, Args>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<S, Args>,
        Args: 'static,
    {
        let name = name.into();
        let signature = MethodSignature {
            arity: H::ARITY,
            shape: <H::Output as IntoReturn>::SHAPE,
            fallible: <H::Output as IntoReturn>::FALLIBLE,
        };
        debug!(method = %name, ?signature, "Registered method");

        let instance = Arc::clone(&self.instance);
        let invoke: Invoke = Box::new(move |args| handler.call(&instance, args));
        self.methods.insert(name, Method { signature, invoke });
        self
    }

    pub fn build(self) -> Service {
        Service {
            type_name: std::any::type_name::<S>(),
            methods: self.methods,
        }
    }
}

impl<S: Send + Sync + 'static> From<ServiceBuilder<S>> for Service {
    fn from(builder: ServiceBuilder<S>) -> Self {
        builder.build()
    }
}

/// Name to service map shared read-only by every stream handler
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `service` under `name`. Last write wins.
    pub fn register(&mut self, name: impl Into<String>, service: impl Into<Service>) {
        let name = name.into();
        if name.contains(SERVICE_METHOD_SEPARATOR) {
            warn!(service = %name, "Service name contains the method separator and is unreachable");
        }
        if self
            .services
            .insert(name.clone(), Arc::new(service.into()))
            .is_some()
        {
            debug!(service = %name, "Replaced registered service");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.get(name).map(Arc::as_ref)
    }

    /// Registered service names in sorted order
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Resolve `"Service.Method"` and invoke it
    pub fn dispatch(&self, service_method: &str, args: Vec<Value>) -> Result<Value> {
        let (service, method) = split_service_method(service_method)?;
        self.services
            .get(service)
            .ok_or_else(|| RpcError::ServiceNotFound(service.to_string()))?
            .call(method, args)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::rpc_args;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Calc {
        calls: AtomicU64,
    }

    impl Calc {
        fn add(&self, a: i64, b: i64) -> i64 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            a + b
        }

        fn divide(&self, a: i64, b: i64) -> std::result::Result<f64, String> {
            if b == 0 {
                return Err("division by zero".to_string());
            }
            Ok(a as f64 / b as f64)
        }

        fn div_mod(&self, a: u64, b: u64) -> std::result::Result<(u64, u64), &'static str> {
            if b == 0 {
                return Err("division by zero");
            }
            Ok((a / b, a % b))
        }

        fn reset(&self) {
            self.calls.store(0, Ordering::Relaxed);
        }

        fn check(&self, ok: bool) -> std::result::Result<(), String> {
            if ok {
                Ok(())
            } else {
                Err("check failed".into())
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.register(
            "Calc",
            Service::new(Calc::default())
                .method("Add", Calc::add)
                .method("Divide", Calc::divide)
                .method("DivMod", Calc::div_mod)
                .method("Reset", Calc::reset)
                .method("Check", Calc::check)
                .method("Calls", Calc::calls),
        );
        registry
    }

    #[test]
    fn dispatches_single_result() {
        assert_eq!(
            registry().dispatch("Calc.Add", rpc_args![10, 20]).unwrap(),
            Value::Int(30)
        );
    }

    #[test]
    fn trailing_error_short_circuits() {
        let err = registry()
            .dispatch("Calc.Divide", rpc_args![10, 0])
            .unwrap_err();
        assert_eq!(err.to_string(), "division by zero");

        assert_eq!(
            registry().dispatch("Calc.Divide", rpc_args![10, 4]).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn multiple_results_keep_declared_order() {
        assert_eq!(
            registry().dispatch("Calc.DivMod", rpc_args![17u64, 5u64]).unwrap(),
            Value::List(vec![Value::UInt(3), Value::UInt(2)])
        );
    }

    #[test]
    fn void_results_are_null() {
        let registry = registry();
        assert_eq!(registry.dispatch("Calc.Reset", vec![]).unwrap(), Value::Null);
        assert_eq!(
            registry.dispatch("Calc.Check", rpc_args![true]).unwrap(),
            Value::Null
        );
        assert!(matches!(
            registry.dispatch("Calc.Check", rpc_args![false]),
            Err(RpcError::Service(_))
        ));
    }

    #[test]
    fn methods_share_one_instance() {
        let registry = registry();
        registry.dispatch("Calc.Add", rpc_args![1, 2]).unwrap();
        registry.dispatch("Calc.Add", rpc_args![3, 4]).unwrap();
        assert_eq!(registry.dispatch("Calc.Calls", vec![]).unwrap(), Value::UInt(2));
    }

    #[test]
    fn lookup_failures() {
        let registry = registry();
        assert!(matches!(
            registry.dispatch("Missing.Foo", vec![]),
            Err(RpcError::ServiceNotFound(ref s)) if s == "Missing"
        ));
        assert!(matches!(
            registry.dispatch("Calc.Nope", vec![]),
            Err(RpcError::MethodNotFound(ref m)) if m == "Nope"
        ));
        assert!(matches!(
            registry.dispatch("NoDotHere", vec![]),
            Err(RpcError::InvalidServiceMethod(_))
        ));
    }

    #[test]
    fn argument_mismatches_are_dispatch_errors() {
        let registry = registry();
        assert!(matches!(
            registry.dispatch("Calc.Add", rpc_args![1]),
            Err(RpcError::ArgumentMismatch(_))
        ));
        assert!(matches!(
            registry.dispatch("Calc.Add", rpc_args![1, "two"]),
            Err(RpcError::ArgumentMismatch(ref m)) if m.starts_with("argument 1")
        ));
    }

    #[test]
    fn signatures_are_recorded_at_registration() {
        let registry = registry();
        let calc = registry.get("Calc").unwrap();
        assert_eq!(
            calc.signature("Divide"),
            Some(MethodSignature {
                arity: 2,
                shape: ReturnShape::Single,
                fallible: true,
            })
        );
        assert_eq!(calc.signature("DivMod").unwrap().shape, ReturnShape::Multiple(2));
        assert_eq!(calc.signature("Reset").unwrap().shape, ReturnShape::Void);
        assert_eq!(calc.signature("Check").unwrap().arity, 1);
        assert_eq!(
            calc.methods(),
            vec!["Add", "Calls", "Check", "DivMod", "Divide", "Reset"]
        );
    }

    #[test]
    fn reregistration_overwrites() {
        struct Echo;
        impl Echo {
            fn echo(&self, s: String) -> String {
                s
            }
        }

        let mut registry = registry();
        registry.register("Calc", Service::new(Echo).method("Echo", Echo::echo));
        assert_eq!(registry.services(), vec!["Calc"]);
        assert!(matches!(
            registry.dispatch("Calc.Add", rpc_args![1, 2]),
            Err(RpcError::MethodNotFound(_))
        ));
        assert_eq!(
            registry.dispatch("Calc.Echo", rpc_args!["hi"]).unwrap(),
            Value::Str("hi".into())
        );
    }

    #[test]
    fn closures_register_as_methods() {
        let mut registry = ServiceRegistry::new();
        registry.register(
            "Math",
            Service::new(10i64).method("Scale", |base: &i64, x: i64| base * x),
        );
        assert_eq!(
            registry.dispatch("Math.Scale", rpc_args![4]).unwrap(),
            Value::Int(40)
        );
    }
}
