use table::{Align, IntoTable, Table};
mod table;

use lx_litellm::config::Config;
use lx_litellm::providers::litellm::gateway_model;
use lx_litellm::providers::providers::ProviderIdentifier;
use lx_litellm::registry::{populate::populated_registry, ProviderEntry, Registry};

use crate::{die, ListArgs, ListingFormat, ResolveArgs};

#[derive(serde::Serialize)]
struct Route {
    pattern: String,
    priority: u8,
    provider: ProviderIdentifier,
}

impl From<&ProviderEntry> for Route {
    fn from(entry: &ProviderEntry) -> Self {
        Route {
            pattern: entry.pattern().to_string(),
            priority: entry.priority(),
            provider: entry.provider(),
        }
    }
}

impl From<Vec<Route>> for Table {
    fn from(value: Vec<Route>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["PATTERN", "PRIORITY", "PROVIDER"]);
        tab.align_column(1, Align::Right);

        for route in value {
            tab.add_row(vec![
                route.pattern,
                route.priority.to_string(),
                route.provider.to_string(),
            ]);
        }

        tab
    }
}

#[derive(serde::Serialize)]
struct Resolution {
    model_id: String,
    provider: ProviderIdentifier,
    pattern: String,
    priority: u8,
    gateway_model: String,
}

impl From<Resolution> for Table {
    fn from(value: Resolution) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "PROVIDER", "PATTERN", "PRIORITY", "GATEWAY_MODEL"]);
        tab.align_column(3, Align::Right);

        tab.add_row(vec![
            value.model_id,
            value.provider.to_string(),
            value.pattern,
            value.priority.to_string(),
            value.gateway_model,
        ]);

        tab
    }
}

fn format_output<O: IntoTable + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize listing: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

fn registry(config: &Config) -> Registry {
    match populated_registry(config) {
        Ok(registry) => registry,
        Err(err) => die!("failed to build the provider registry: {}", err),
    }
}

pub(crate) fn list_cmd(config: &Config, args: &ListArgs) {
    let registry = registry(config);

    let routes: Vec<Route> = registry.entries().iter().map(Route::from).collect();

    format_output(routes, args.format);
}

pub(crate) fn resolve_cmd(config: &Config, args: &ResolveArgs) {
    let registry = registry(config);

    let entry = match registry.resolve(&args.model) {
        Ok(entry) => entry,
        Err(err) => die!("{}", err),
    };

    let resolution = Resolution {
        model_id: args.model.clone(),
        provider: entry.provider(),
        pattern: entry.pattern().to_string(),
        priority: entry.priority(),
        gateway_model: gateway_model(&args.model).to_string(),
    };

    format_output(resolution, ListingFormat::Table);
}
