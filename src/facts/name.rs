// SPDX-License-Identifier: BSD-3-Clause
//! Interned identifier types for the entities named by fact tuples.
//!
//! Facts and derived relation tuples refer to program entities by symbolic
//! name: a fully-qualified method signature, a qualified local variable, an
//! allocation site, and so on. Each kind gets its own newtype so that a join
//! can't accidentally compare, say, a variable against a field. The backing
//! storage is a shared `Arc<str>`, since the same identifier appears in many
//! tuples and the relations clone names on every insertion.

use std::fmt::Display;
use std::sync::Arc;

macro_rules! name_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(Arc::from(s.as_str()))
            }
        }

        impl<T> PartialEq<T> for $name
        where
            T: AsRef<str>,
        {
            fn eq(&self, other: &T) -> bool {
                (*self.0).eq(other.as_ref())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

name_type! {
    /// A fully-qualified method signature, e.g.
    /// `<Main: void main(java.lang.String[])>`.
    MethodName
}

name_type! {
    /// An unqualified method name, as invoked at a virtual call site.
    /// Dispatch resolution pairs this with the receiver's allocated class.
    SimpleName
}

name_type! {
    /// A class (or array) type name.
    ClassName
}

name_type! {
    /// A local variable, qualified by its enclosing method.
    VariableName
}

name_type! {
    /// An instance field name.
    FieldName
}

name_type! {
    /// An allocation site: the analysis's abstraction of one runtime object.
    SiteName
}

name_type! {
    /// A call site, qualified by its enclosing method.
    InvocationName
}
