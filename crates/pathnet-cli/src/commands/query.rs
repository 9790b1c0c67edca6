//! One-shot path and network queries against the configured engine

use clap::Args;
use serde::Serialize;
use url::form_urlencoded;

use pathnet_core::limits::{
    DEFAULT_BUILD_OUT, DEFAULT_MAX_ENTITIES, DEFAULT_NETWORK_MAX_DEGREES, DEFAULT_PATH_MAX_DEGREES,
};
use pathnet_core::{ApiResponse, ErrorResponse, NetworkParams, PathParams, Timers};

use crate::output::format_json;
use crate::AppContext;

#[derive(Args)]
pub struct PathArgs {
    /// Starting entity: an entity id, DATA_SOURCE:RECORD_ID or a JSON identifier
    pub from: String,

    /// Ending entity
    pub to: String,

    /// Maximum degrees of separation
    #[arg(long, default_value_t = DEFAULT_PATH_MAX_DEGREES, allow_negative_numbers = true)]
    pub max_degrees: i64,

    /// Entity to avoid (can be used multiple times)
    #[arg(short = 'x', long = "avoid")]
    pub avoid: Vec<String>,

    /// Never route through avoided entities
    #[arg(long)]
    pub forbid_avoided: bool,

    /// Require an entity from this data source on the path (can be used multiple times)
    #[arg(short = 's', long = "source")]
    pub sources: Vec<String>,

    /// Include the engine document verbatim
    #[arg(long)]
    pub with_raw: bool,

    /// Print JSON on one line
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args)]
pub struct NetworkArgs {
    /// Member entities
    #[arg(required = true)]
    pub entities: Vec<String>,

    /// Maximum degrees of separation between members
    #[arg(long, default_value_t = DEFAULT_NETWORK_MAX_DEGREES, allow_negative_numbers = true)]
    pub max_degrees: i64,

    /// Degrees to build out beyond the paths
    #[arg(long, default_value_t = DEFAULT_BUILD_OUT, allow_negative_numbers = true)]
    pub build_out: i64,

    /// Maximum entities in the network
    #[arg(long, default_value_t = DEFAULT_MAX_ENTITIES, allow_negative_numbers = true)]
    pub max_entities: i64,

    /// Include the engine document verbatim
    #[arg(long)]
    pub with_raw: bool,

    /// Print JSON on one line
    #[arg(long)]
    pub compact: bool,
}

impl PathArgs {
    fn params(&self) -> PathParams {
        PathParams {
            from: Some(self.from.clone()),
            to: Some(self.to.clone()),
            max_degrees: self.max_degrees,
            avoid: self.avoid.clone(),
            forbid_avoided: self.forbid_avoided,
            sources: self.sources.clone(),
            with_raw: self.with_raw,
        }
    }

    /// The equivalent `GET /entity-paths` URI
    fn self_link(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("from", &self.from);
        query.append_pair("to", &self.to);
        query.append_pair("maxDegrees", &self.max_degrees.to_string());
        for id in &self.avoid {
            query.append_pair("x", id);
        }
        if self.forbid_avoided {
            query.append_pair("forbidAvoided", "true");
        }
        for source in &self.sources {
            query.append_pair("s", source);
        }
        if self.with_raw {
            query.append_pair("withRaw", "true");
        }
        format!("/entity-paths?{}", query.finish())
    }
}

impl NetworkArgs {
    fn params(&self) -> NetworkParams {
        NetworkParams {
            entities: self.entities.clone(),
            max_degrees: self.max_degrees,
            build_out: self.build_out,
            max_entities: self.max_entities,
            with_raw: self.with_raw,
        }
    }

    /// The equivalent `GET /entity-networks` URI
    fn self_link(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for id in &self.entities {
            query.append_pair("e", id);
        }
        query.append_pair("maxDegrees", &self.max_degrees.to_string());
        query.append_pair("buildOut", &self.build_out.to_string());
        query.append_pair("maxEntities", &self.max_entities.to_string());
        if self.with_raw {
            query.append_pair("withRaw", "true");
        }
        format!("/entity-networks?{}", query.finish())
    }
}

pub fn run_path(args: &PathArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let link = args.self_link();
    tracing::debug!("Running {}", link);
    let outcome = ctx
        .service
        .find_path(&args.params(), &link, Timers::started(&["overall"]));
    report(outcome, args.compact)
}

pub fn run_network(args: &NetworkArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let link = args.self_link();
    tracing::debug!("Running {}", link);
    let outcome = ctx
        .service
        .find_network(&args.params(), &link, Timers::started(&["overall"]));
    report(outcome, args.compact)
}

/// Print the envelope; an error envelope exits with status 1
fn report<T: Serialize>(
    outcome: Result<ApiResponse<T>, ErrorResponse>,
    compact: bool,
) -> anyhow::Result<()> {
    match outcome {
        Ok(response) => {
            println!("{}", format_json(&response, compact)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", format_json(&failure, compact)?);
            eprintln!("Error: {}", failure.error());
            std::process::exit(1);
        }
    }
}
