use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{Element, ResizeObserver, ResizeObserverEntry};

/// Size of the hosting container in device-independent pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewportSize {
	pub width: f64,
	pub height: f64,
}

impl ViewportSize {
	pub const ZERO: ViewportSize = ViewportSize {
		width: 0.0,
		height: 0.0,
	};

	pub fn new(width: f64, height: f64) -> Self {
		Self { width, height }
	}

	/// Layout and drawing only happen for sizes where this holds.
	pub fn is_positive(&self) -> bool {
		self.width > 0.0 && self.height > 0.0
	}

	pub fn center(&self) -> (f64, f64) {
		(self.width / 2.0, self.height / 2.0)
	}
}

/// Filters raw observations down to meaningful changes: non-positive sizes
/// and repeats of the last emitted size are swallowed.
#[derive(Clone, Debug, Default)]
pub struct ViewportGate {
	last: Option<ViewportSize>,
}

impl ViewportGate {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn observe(&mut self, size: ViewportSize) -> Option<ViewportSize> {
		if !size.is_positive() || self.last == Some(size) {
			return None;
		}
		self.last = Some(size);
		Some(size)
	}
}

/// Content-box observation of one element. Dropping the subscription
/// disconnects the observer and releases its callback.
pub struct ResizeSubscription {
	observer: Option<ResizeObserver>,
	_callback: Closure<dyn FnMut(js_sys::Array)>,
}

impl ResizeSubscription {
	/// Starts observing `element`; `on_resize` sees only gated sizes.
	pub fn observe(element: &Element, on_resize: impl FnMut(ViewportSize) + 'static) -> Result<Self, JsValue> {
		let gate = Rc::new(RefCell::new(ViewportGate::new()));
		let on_resize = Rc::new(RefCell::new(on_resize));
		let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
			// only the last entry matters when several are batched
			let Some(entry) = entries.iter().last() else {
				return;
			};
			let entry: ResizeObserverEntry = entry.unchecked_into();
			let rect = entry.content_rect();
			let size = ViewportSize::new(rect.width(), rect.height());
			if let Some(size) = gate.borrow_mut().observe(size) {
				(on_resize.borrow_mut())(size);
			}
		});
		let observer = ResizeObserver::new(callback.as_ref().unchecked_ref())?;
		observer.observe(element);
		Ok(Self {
			observer: Some(observer),
			_callback: callback,
		})
	}

	pub fn is_active(&self) -> bool {
		self.observer.is_some()
	}

	/// Stops observation. Safe to call more than once.
	pub fn disconnect(&mut self) {
		if let Some(observer) = self.observer.take() {
			observer.disconnect();
			log::debug!("resize observer disconnected");
		}
	}
}

impl Drop for ResizeSubscription {
	fn drop(&mut self) {
		self.disconnect();
	}
}
