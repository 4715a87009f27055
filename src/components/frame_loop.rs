use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

/// Seconds assumed for the first frame.
const FIRST_FRAME_DT: f64 = 0.016;
/// Longer gaps (background tab) are clamped so the camera does not jump.
const MAX_FRAME_DT: f64 = 0.1;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

#[derive(Default)]
struct FrameClock {
	handle: Option<i32>,
	last: Option<f64>,
}

/// `requestAnimationFrame` loop that lives as long as this value. Dropping it
/// cancels the pending frame and frees the callback.
pub struct AnimationFrameLoop {
	clock: Rc<RefCell<FrameClock>>,
	callback: FrameCallback,
}

impl AnimationFrameLoop {
	/// Calls `on_frame` with the elapsed seconds once per frame.
	pub fn start(mut on_frame: impl FnMut(f64) + 'static) -> Result<Self, JsValue> {
		let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
		let clock = Rc::new(RefCell::new(FrameClock::default()));
		let callback: FrameCallback = Rc::new(RefCell::new(None));

		let (clock_cb, callback_cb) = (clock.clone(), callback.clone());
		*callback.borrow_mut() = Some(Closure::new(move |now: f64| {
			let dt = {
				let mut clock = clock_cb.borrow_mut();
				let dt = clock
					.last
					.map_or(FIRST_FRAME_DT, |last| ((now - last) / 1000.0).clamp(0.0, MAX_FRAME_DT));
				clock.last = Some(now);
				clock.handle = None;
				dt
			};
			on_frame(dt);
			let next = callback_cb.borrow().as_ref().and_then(|cb| {
				web_sys::window()?
					.request_animation_frame(cb.as_ref().unchecked_ref())
					.ok()
			});
			clock_cb.borrow_mut().handle = next;
		}));

		let first = match callback.borrow().as_ref() {
			Some(cb) => window.request_animation_frame(cb.as_ref().unchecked_ref())?,
			None => return Err(JsValue::from_str("frame callback missing")),
		};
		clock.borrow_mut().handle = Some(first);
		log::debug!("animation frame loop started");
		Ok(Self { clock, callback })
	}
}

impl Drop for AnimationFrameLoop {
	fn drop(&mut self) {
		if let Some(handle) = self.clock.borrow_mut().handle.take() {
			if let Some(window) = web_sys::window() {
				let _ = window.cancel_animation_frame(handle);
			}
		}
		// breaks the closure's reference to itself
		self.callback.borrow_mut().take();
		log::debug!("animation frame loop stopped");
	}
}
