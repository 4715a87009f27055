use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api::{ApiClient, Suspect};
use crate::components::coordinator::View;
use crate::components::investigation::Investigation;
use crate::config::AppConfig;

fn short_address(address: &str) -> String {
	if address.chars().count() > 14 {
		let head: String = address.chars().take(8).collect();
		let tail: String = address.chars().skip(address.chars().count() - 4).collect();
		format!("{head}…{tail}")
	} else {
		address.to_string()
	}
}

/// Subject selection plus the investigation canvas.
#[component]
pub fn Home() -> impl IntoView {
	let config = use_context::<AppConfig>().unwrap_or_else(AppConfig::from_env);
	let subject = RwSignal::new(None::<String>);
	let view = RwSignal::new(View::Network);
	let address = RwSignal::new(String::new());
	let suspects = RwSignal::new(None::<Result<Vec<Suspect>, String>>);

	let api = ApiClient::new(&config.api_base_url);
	spawn_local(async move {
		let result = api.suspects().await.map_err(|err| {
			log::warn!("anomaly list unavailable: {err}");
			err.to_string()
		});
		let _ = suspects.try_set(Some(result));
	});

	let on_submit = move |ev: leptos::ev::SubmitEvent| {
		ev.prevent_default();
		let value = address.get_untracked();
		let value = value.trim();
		if !value.is_empty() {
			subject.set(Some(value.to_string()));
		}
	};

	let suspect_list = move || match suspects.get() {
		None => view! { <p class="muted">"Loading suspects…"</p> }.into_any(),
		Some(Err(_)) => view! { <p class="muted">"Suspect list unavailable."</p> }.into_any(),
		Some(Ok(list)) if list.is_empty() => view! { <p class="muted">"No anomalies flagged."</p> }.into_any(),
		Some(Ok(list)) => view! {
			<ul class="suspect-list">
				{list
					.into_iter()
					.map(|s| {
						let selected_address = s.address.clone();
						let is_selected = {
							let address = s.address.clone();
							move || subject.with(|current| current.as_deref() == Some(address.as_str()))
						};
						let risk = s.risk_level.clone().unwrap_or_else(|| "unknown".to_string());
						let confidence = s
							.confidence
							.map(|c| format!("{:.0}%", c * 100.0))
							.unwrap_or_default();
						view! {
							<li
								class="suspect"
								class:selected=is_selected
								on:click=move |_| subject.set(Some(selected_address.clone()))
							>
								<span class="suspect-address">{short_address(&s.address)}</span>
								<span class=format!("risk risk-{}", risk.to_lowercase())>{risk.clone()}</span>
								<span class="confidence">{confidence}</span>
							</li>
						}
					})
					.collect_view()}
			</ul>
		}
		.into_any(),
	};

	view! {
		<div class="dashboard">
			<aside class="sidebar">
				<h1>"Investigation"</h1>
				<form class="address-form" on:submit=on_submit>
					<input
						type="text"
						placeholder="Wallet or account address"
						prop:value=move || address.get()
						on:input=move |ev| address.set(event_target_value(&ev))
					/>
					<button type="submit">"Trace"</button>
				</form>
				<h2>"Flagged subjects"</h2>
				{suspect_list}
			</aside>

			<main class="workspace">
				<nav class="tabs">
					{[View::Network, View::Flow]
						.into_iter()
						.map(|tab| {
							view! {
								<button
									class="tab"
									class:active=move || view.get() == tab
									on:click=move |_| view.set(tab)
								>
									{tab.title()}
								</button>
							}
						})
						.collect_view()}
				</nav>
				<Investigation subject=subject view=view />
			</main>
		</div>
	}
}
