use leptos::prelude::*;
use leptos::task::spawn_local;
use web_sys::{KeyboardEvent, MouseEvent, WheelEvent};

use crate::api::ApiClient;
use crate::components::canvas;
use crate::components::coordinator::{Command, FetchTicket, Panel, RenderCoordinator, View};
use crate::components::frame_loop::AnimationFrameLoop;
use crate::components::viewport::ResizeSubscription;
use crate::config::AppConfig;

/// Browser resources tied to the mounted canvas.
#[derive(Default)]
struct Subscriptions {
	resize: Option<ResizeSubscription>,
	frames: Option<AnimationFrameLoop>,
}

impl Subscriptions {
	fn is_active(&self) -> bool {
		self.resize.as_ref().is_some_and(ResizeSubscription::is_active) && self.frames.is_some()
	}
}

type Coordinator = StoredValue<RenderCoordinator, LocalStorage>;

/// Screen pixels moved per arrow key press.
const PAN_STEP: f64 = 40.0;

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas = canvas_ref.get_untracked()?;
	let rect = canvas.get_bounding_client_rect();
	Some((ev.client_x() as f64 - rect.left(), ev.client_y() as f64 - rect.top()))
}

fn fetch(api: &ApiClient, coordinator: Coordinator, ticket: FetchTicket, refresh: impl Fn() + Copy + 'static) {
	log::debug!("fetching {} from {}", ticket.subject(), api.base_url());
	let (api_ego, ticket_ego) = (api.clone(), ticket.clone());
	spawn_local(async move {
		let result = api_ego.ego_graph(ticket_ego.subject()).await;
		// the view may have been unmounted while waiting
		if coordinator
			.try_update_value(|c| c.accept_ego(&ticket_ego, result))
			.unwrap_or(false)
		{
			refresh();
		}
	});
	let api_flow = api.clone();
	spawn_local(async move {
		let result = api_flow.flow_graph(ticket.subject()).await;
		if coordinator
			.try_update_value(|c| c.accept_flow(&ticket, result))
			.unwrap_or(false)
		{
			refresh();
		}
	});
}

/// Canvas hosting the network and flow views of the selected subject.
///
/// Clicking a node in the network view makes it the new subject.
#[component]
pub fn Investigation(subject: RwSignal<Option<String>>, view: RwSignal<View>) -> impl IntoView {
	let config = use_context::<AppConfig>().unwrap_or_else(AppConfig::from_env);
	let api = ApiClient::new(&config.api_base_url);

	let stage_ref = NodeRef::<leptos::html::Div>::new();
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let coordinator: Coordinator = StoredValue::new_local(RenderCoordinator::default());
	let subscriptions = StoredValue::new_local(Subscriptions::default());
	let panel = RwSignal::new(Panel::NoSubject);

	let refresh = move || {
		if let Some(p) = coordinator.try_with_value(|c| c.panel(view.get_untracked())) {
			panel.set(p);
		}
	};

	Effect::new(move |_| {
		let Some(selected) = subject.get() else {
			return;
		};
		if let Some(ticket) = coordinator.try_update_value(|c| c.select_subject(&selected)).flatten() {
			fetch(&api, coordinator, ticket, refresh);
		}
		refresh();
	});

	Effect::new(move |_| {
		let active = view.get();
		coordinator.update_value(|c| {
			for other in [View::Network, View::Flow] {
				if other != active {
					c.unmount(other);
				}
			}
			c.mount(active);
		});
		refresh();
	});

	Effect::new(move |_| {
		let (Some(stage), Some(canvas_el)) = (stage_ref.get(), canvas_ref.get()) else {
			return;
		};
		if subscriptions.with_value(Subscriptions::is_active) {
			return;
		}
		let Some(ctx) = canvas::context_2d(&canvas_el) else {
			log::error!("canvas has no 2d context");
			return;
		};

		let resize_canvas = canvas_el.clone();
		let resize = ResizeSubscription::observe(&stage, move |size| {
			canvas::fit_to(&resize_canvas, size);
			if coordinator.try_update_value(|c| c.resize(size)).unwrap_or(false) {
				refresh();
			}
		});
		let frames = AnimationFrameLoop::start(move |dt| {
			// nothing moved and nothing changed since the last paint
			let commands = coordinator
				.try_update_value(|c| c.tick(dt).then(|| c.render(view.get_untracked())))
				.flatten();
			if let Some(commands) = commands {
				canvas::paint(&ctx, &commands);
			}
		});
		match (resize, frames) {
			(Ok(resize), Ok(frames)) => subscriptions.set_value(Subscriptions {
				resize: Some(resize),
				frames: Some(frames),
			}),
			(Err(err), _) | (_, Err(err)) => log::error!("could not attach canvas: {err:?}"),
		}
	});

	on_cleanup(move || {
		subscriptions.try_update_value(|s| {
			s.frames.take();
			s.resize.take();
		});
		coordinator.try_update_value(|c| {
			c.unmount(View::Network);
			c.unmount(View::Flow);
		});
	});

	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		coordinator.update_value(|c| {
			if let Some(engine) = c.force_mut() {
				engine.pointer_down(x, y);
			}
		});
	};

	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		coordinator.update_value(|c| {
			if let Some(engine) = c.force_mut() {
				engine.pointer_move(x, y);
			}
		});
	};

	let on_mouseup = move |_: MouseEvent| {
		let clicked = coordinator
			.try_update_value(|c| c.force_mut().and_then(|engine| engine.pointer_up()))
			.flatten();
		if let Some(id) = clicked {
			log::debug!("node {id} clicked");
			subject.set(Some(id));
		}
	};

	let on_mouseleave = move |_: MouseEvent| {
		coordinator.update_value(|c| {
			if let Some(engine) = c.force_mut() {
				engine.pointer_leave();
			}
		});
	};

	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		coordinator.update_value(|c| {
			if let Some(engine) = c.force_mut() {
				engine.wheel(x, y, ev.delta_y());
			}
		});
	};

	let command = move |cmd: Command| coordinator.update_value(|c| c.command(cmd));

	let on_keydown = move |ev: KeyboardEvent| {
		// arrow keys move the camera, so the graph moves the other way
		let cmd = match ev.key().as_str() {
			"ArrowLeft" => Command::Pan(PAN_STEP, 0.0),
			"ArrowRight" => Command::Pan(-PAN_STEP, 0.0),
			"ArrowUp" => Command::Pan(0.0, PAN_STEP),
			"ArrowDown" => Command::Pan(0.0, -PAN_STEP),
			"+" | "=" => Command::ZoomIn,
			"-" => Command::ZoomOut,
			_ => return,
		};
		ev.prevent_default();
		command(cmd);
	};

	view! {
		<div class="investigation">
			<div node_ref=stage_ref class="investigation-stage">
				<canvas
					node_ref=canvas_ref
					class="investigation-canvas"
					tabindex="0"
					on:keydown=on_keydown
					on:mousedown=on_mousedown
					on:mousemove=on_mousemove
					on:mouseup=on_mouseup
					on:mouseleave=on_mouseleave
					on:wheel=on_wheel
				/>
			</div>
			<div class="graph-controls" class:hidden=move || view.get() != View::Network>
				<button title="Reheat" on:click=move |_| command(Command::Reheat)>"⟳"</button>
				<button title="Zoom in" on:click=move |_| command(Command::ZoomIn)>"+"</button>
				<button title="Zoom out" on:click=move |_| command(Command::ZoomOut)>"−"</button>
				<button title="Fit" on:click=move |_| command(Command::ZoomToFit)>"⤢"</button>
			</div>
			{move || {
				let message = match panel.get() {
					Panel::Ready => return None,
					Panel::NoSubject => "Select a subject to start the investigation.".to_string(),
					Panel::Loading => format!("Loading {} data…", view.get().title().to_lowercase()),
					Panel::Unavailable(reason) => format!("No data available for this subject ({reason})."),
				};
				Some(view! { <div class="empty-state">{message}</div> })
			}}
		</div>
	}
}
