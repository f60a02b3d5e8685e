//! Slot payloads and the four-way ownership model.
//!
//! Every slot in a [`crate::Prototype`] holds one [`Payload`]. The variant
//! is the slot's [`Kind`] and decides what happens when the payload is
//! discarded, either because the slot is overwritten or because the table
//! is torn down:
//!
//! - `Callable`: the shared callable reference is dropped; no destructor.
//! - `OwnedValue`: the boxed value is handed to its destructor, or dropped
//!   when none was supplied.
//! - `OwnedHandle`: the inline value is handed to its destructor when one
//!   was supplied.
//! - `UnmanagedValue`: nothing runs.
//!
//! Release happens in `Drop` for [`Owned`], so a payload can be released at
//! most once no matter how it leaves the table.

use crate::inline::{Inline, InlineValue};
use core::any::Any;
use core::fmt;
use core::mem::ManuallyDrop;
use std::rc::Rc;

/// Cleanup callback that consumes a released payload.
pub type Destructor<T> = Box<dyn FnOnce(T)>;

/// Callable slot contents. Callers store a concrete function or closure
/// type and downcast on the way out.
pub type Method = Rc<dyn Any>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Kind {
    Callable,
    OwnedValue,
    OwnedHandle,
    UnmanagedValue,
}

/// A value paired with an optional destructor that receives it on drop.
pub struct Owned<T> {
    value: ManuallyDrop<T>,
    destructor: Option<Destructor<T>>,
}

impl<T> Owned<T> {
    pub fn new(value: T, destructor: Option<Destructor<T>>) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            destructor,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn has_destructor(&self) -> bool {
        self.destructor.is_some()
    }
}

impl<T> Drop for Owned<T> {
    fn drop(&mut self) {
        // SAFETY: `value` is taken exactly once, here, and never read again.
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        match self.destructor.take() {
            Some(destructor) => destructor(value),
            None => drop(value),
        }
    }
}

pub enum Payload {
    Callable(Method),
    OwnedValue(Owned<Box<dyn Any>>),
    OwnedHandle(Owned<InlineValue>),
    UnmanagedValue(InlineValue),
}

impl Payload {
    pub fn callable<F: Any>(f: F) -> Self {
        Payload::Callable(Rc::new(f))
    }

    /// Boxed value released by dropping it.
    pub fn owned<T: Any>(value: T) -> Self {
        let value: Box<dyn Any> = Box::new(value);
        Payload::OwnedValue(Owned::new(value, None))
    }

    /// Boxed value released through `destructor`.
    pub fn owned_with<T, D>(value: T, destructor: D) -> Self
    where
        T: Any,
        D: FnOnce(Box<dyn Any>) + 'static,
    {
        let value: Box<dyn Any> = Box::new(value);
        let destructor: Destructor<Box<dyn Any>> = Box::new(destructor);
        Payload::OwnedValue(Owned::new(value, Some(destructor)))
    }

    /// Inline handle released through `destructor`.
    pub fn handle<T, D>(value: T, destructor: D) -> Self
    where
        T: Inline,
        D: FnOnce(InlineValue) + 'static,
    {
        let destructor: Destructor<InlineValue> = Box::new(destructor);
        Payload::OwnedHandle(Owned::new(InlineValue::new(value), Some(destructor)))
    }

    /// Inline handle whose destructor is optional.
    pub fn owned_handle(value: InlineValue, destructor: Option<Destructor<InlineValue>>) -> Self {
        Payload::OwnedHandle(Owned::new(value, destructor))
    }

    pub fn unmanaged<T: Inline>(value: T) -> Self {
        Payload::UnmanagedValue(InlineValue::new(value))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Payload::Callable(_) => Kind::Callable,
            Payload::OwnedValue(_) => Kind::OwnedValue,
            Payload::OwnedHandle(_) => Kind::OwnedHandle,
            Payload::UnmanagedValue(_) => Kind::UnmanagedValue,
        }
    }

    /// Callables and boxed values are handed out directly; inline kinds
    /// hand out their slot.
    pub fn view(&self) -> SlotRef<'_> {
        match self {
            Payload::Callable(m) => SlotRef::Callable(m),
            Payload::OwnedValue(o) => SlotRef::Value(&**o.get()),
            Payload::OwnedHandle(o) => SlotRef::Inline(o.get()),
            Payload::UnmanagedValue(v) => SlotRef::Inline(v),
        }
    }

    pub fn view_mut(&mut self) -> SlotMut<'_> {
        match self {
            Payload::Callable(m) => SlotMut::Callable(m),
            Payload::OwnedValue(o) => SlotMut::Value(&mut **o.get_mut()),
            Payload::OwnedHandle(o) => SlotMut::Inline(o.get_mut()),
            Payload::UnmanagedValue(v) => SlotMut::Inline(v),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Callable(_) => f.write_str("Callable(..)"),
            Payload::OwnedValue(o) => f
                .debug_struct("OwnedValue")
                .field("destructor", &o.has_destructor())
                .finish_non_exhaustive(),
            Payload::OwnedHandle(o) => f
                .debug_struct("OwnedHandle")
                .field("value", o.get())
                .field("destructor", &o.has_destructor())
                .finish(),
            Payload::UnmanagedValue(v) => f.debug_tuple("UnmanagedValue").field(v).finish(),
        }
    }
}

/// Borrowed view of a slot, shaped by its kind.
#[derive(Clone, Copy)]
pub enum SlotRef<'a> {
    Callable(&'a Method),
    Value(&'a (dyn Any + 'static)),
    Inline(&'a InlineValue),
}

impl<'a> SlotRef<'a> {
    pub fn as_callable(&self) -> Option<&'a Method> {
        match *self {
            SlotRef::Callable(m) => Some(m),
            _ => None,
        }
    }

    pub fn downcast<T: Any>(&self) -> Option<&'a T> {
        match *self {
            SlotRef::Value(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_inline(&self) -> Option<&'a InlineValue> {
        match *self {
            SlotRef::Inline(v) => Some(v),
            _ => None,
        }
    }

    /// Read an inline slot as `T`; `None` for non-inline kinds.
    pub fn read<T: Inline>(&self) -> Option<T> {
        self.as_inline().map(InlineValue::get::<T>)
    }
}

impl fmt::Debug for SlotRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRef::Callable(_) => f.write_str("Callable(..)"),
            SlotRef::Value(_) => f.write_str("Value(..)"),
            SlotRef::Inline(v) => f.debug_tuple("Inline").field(v).finish(),
        }
    }
}

/// Mutable view of a slot for writing in place.
pub enum SlotMut<'a> {
    Callable(&'a mut Method),
    Value(&'a mut (dyn Any + 'static)),
    Inline(&'a mut InlineValue),
}

impl<'a> SlotMut<'a> {
    pub fn downcast_mut<T: Any>(self) -> Option<&'a mut T> {
        match self {
            SlotMut::Value(v) => v.downcast_mut::<T>(),
            _ => None,
        }
    }

    pub fn into_inline(self) -> Option<&'a mut InlineValue> {
        match self {
            SlotMut::Inline(v) => Some(v),
            _ => None,
        }
    }

    /// Write `value` into an inline slot. Returns false, writing nothing,
    /// for non-inline kinds.
    pub fn write<T: Inline>(self, value: T) -> bool {
        match self.into_inline() {
            Some(slot) => {
                slot.set(value);
                true
            }
            None => false,
        }
    }
}
