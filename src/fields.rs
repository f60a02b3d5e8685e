//! Typed field and method helpers on top of `Prototype::insert`/`lookup`.
//!
//! These cover the common object-emulation patterns: declare a boxed field
//! and write it, declare an inline field, attach a method, read a field
//! back as a concrete type, and fetch a method to apply it.
//!
//! ```
//! use proto_table::Prototype;
//!
//! type Area = fn(&Prototype) -> f64;
//!
//! fn area(p: &Prototype) -> f64 {
//!     let w: f64 = p.access_inline("w").unwrap();
//!     let h: f64 = p.access_inline("h").unwrap();
//!     w * h
//! }
//!
//! let mut rect = Prototype::new(8).unwrap();
//! rect.inline_field("w", 3.0f64, None).unwrap();
//! rect.inline_field("h", 4.0f64, None).unwrap();
//! *rect.field::<String>("name").unwrap() = "rect".into();
//! rect.define_method("area", area as Area).unwrap();
//!
//! let f = rect.method::<Area>("area").unwrap();
//! assert_eq!(f(&rect), 12.0);
//! assert_eq!(rect.access::<String>("name").unwrap(), "rect");
//! ```

use crate::error::{Result, TableError};
use crate::inline::{Inline, InlineValue};
use crate::payload::{Destructor, Kind, Payload, SlotMut};
use crate::prototype::{Handle, Prototype};
use core::any::Any;
use core::hash::BuildHasher;
use std::rc::Rc;
use tracing::trace;

impl<S> Prototype<S>
where
    S: BuildHasher,
{
    /// Install a boxed `T::default()` under `identifier` and return it for
    /// writing. Any previous payload is released first.
    pub fn field<T: Any + Default>(&mut self, identifier: &str) -> Result<&mut T> {
        self.field_with(identifier, T::default())
    }

    pub fn field_with<T: Any>(&mut self, identifier: &str, value: T) -> Result<&mut T> {
        let handle = self.insert(identifier, Payload::owned(value))?;
        handle
            .get_mut(self)
            .and_then(|slot| slot.downcast_mut::<T>())
            .ok_or_else(|| TableError::TypeMismatch {
                identifier: identifier.to_owned(),
            })
    }

    /// Install an inline field. With a destructor the slot is an owned
    /// handle released through it; without one it is unmanaged.
    pub fn inline_field<T: Inline>(
        &mut self,
        identifier: &str,
        value: T,
        destructor: Option<Destructor<InlineValue>>,
    ) -> Result<&mut InlineValue> {
        let payload = match destructor {
            Some(d) => Payload::owned_handle(InlineValue::new(value), Some(d)),
            None => Payload::unmanaged(value),
        };
        let expected = payload.kind();
        let handle = self.insert(identifier, payload)?;
        match handle.get_mut(self) {
            Some(SlotMut::Inline(slot)) => Ok(slot),
            Some(SlotMut::Value(_)) => Err(mismatch(identifier, expected, Kind::OwnedValue)),
            Some(SlotMut::Callable(_)) => Err(mismatch(identifier, expected, Kind::Callable)),
            None => Err(TableError::Missing {
                identifier: identifier.to_owned(),
            }),
        }
    }

    /// Attach a callable. Store a nameable type (a fn pointer such as
    /// `fn(&Prototype) -> f64`, or an `Rc`'d closure type) so that
    /// [`Prototype::method`] can recover it.
    pub fn define_method<F: Any>(&mut self, identifier: &str, f: F) -> Result<Handle> {
        self.insert(identifier, Payload::callable(f))
    }

    /// Boxed field as `&T`.
    pub fn access<T: Any>(&self, identifier: &str) -> Result<&T> {
        self.expect_kind(identifier, &[Kind::OwnedValue])?;
        self.lookup(identifier)
            .and_then(|slot| slot.downcast::<T>())
            .ok_or_else(|| TableError::TypeMismatch {
                identifier: identifier.to_owned(),
            })
    }

    pub fn access_mut<T: Any>(&mut self, identifier: &str) -> Result<&mut T> {
        self.expect_kind(identifier, &[Kind::OwnedValue])?;
        self.lookup_mut(identifier)
            .and_then(|slot| slot.downcast_mut::<T>())
            .ok_or_else(|| TableError::TypeMismatch {
                identifier: identifier.to_owned(),
            })
    }

    /// Inline field (owned handle or unmanaged) read as `T`.
    pub fn access_inline<T: Inline>(&self, identifier: &str) -> Result<T> {
        let found = self.expect_kind(identifier, &[Kind::UnmanagedValue, Kind::OwnedHandle])?;
        self.lookup(identifier)
            .and_then(|slot| slot.read::<T>())
            .ok_or_else(|| mismatch(identifier, Kind::UnmanagedValue, found))
    }

    /// Fetch a callable as its concrete type. The returned `Rc` does not
    /// borrow the table, so the callable may be applied to it.
    pub fn method<F: Any>(&self, identifier: &str) -> Result<Rc<F>> {
        let found = self.expect_kind(identifier, &[Kind::Callable])?;
        let method = self
            .lookup(identifier)
            .and_then(|slot| slot.as_callable().cloned())
            .ok_or_else(|| mismatch(identifier, Kind::Callable, found))?;
        method.downcast::<F>().map_err(|_| TableError::TypeMismatch {
            identifier: identifier.to_owned(),
        })
    }

    /// `allowed[0]` is reported as the expected kind on mismatch.
    fn expect_kind(&self, identifier: &str, allowed: &[Kind]) -> Result<Kind> {
        let Some(found) = self.kind_of(identifier) else {
            return Err(self.missed(identifier));
        };
        if allowed.contains(&found) {
            Ok(found)
        } else {
            Err(mismatch(identifier, allowed[0], found))
        }
    }

    fn missed(&self, identifier: &str) -> TableError {
        trace!(identifier, "typed access missed");
        TableError::Missing {
            identifier: identifier.to_owned(),
        }
    }
}

fn mismatch(identifier: &str, expected: Kind, found: Kind) -> TableError {
    TableError::KindMismatch {
        identifier: identifier.to_owned(),
        expected,
        found,
    }
}
