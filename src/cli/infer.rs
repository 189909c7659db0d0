use std::io::{self, BufRead, IsTerminal};

use lx_litellm::config::Config;
use lx_litellm::providers::litellm::GatewayKind;
use lx_litellm::providers::ScoredOutput;
use lx_litellm::registry::populate::{populated_registry, resolve_once};

use crate::color::{MaybePaint, OUTPUT_TEXT, PROMPT_INDEX, SCORE};
use crate::{die, warn, InferArgs, OutputFormat};

#[derive(serde::Serialize)]
struct Group<'g> {
    index: usize,
    outputs: &'g [ScoredOutput],
}

/// Prompts from the command line, or one per non-empty line of stdin.
fn read_prompts(args: &InferArgs) -> Vec<String> {
    if !args.prompts.is_empty() {
        return args.prompts.clone();
    }

    let stdin = io::stdin();

    if stdin.is_terminal() {
        die!("no prompts were given, pass them as arguments or through standard input");
    }

    let mut prompts = Vec::new();

    for line in stdin.lock().lines() {
        match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => prompts.push(line),
            Err(err) => die!("failed to read prompts: {}", err),
        }
    }

    prompts
}

fn print_group(index: usize, outputs: &[ScoredOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let group = Group { index, outputs };

            match serde_json::to_string(&group) {
                Ok(line) => println!("{}", line),
                Err(err) => die!("failed to serialize outputs: {}", err),
            }
        }
        OutputFormat::Text => {
            for output in outputs {
                println!(
                    "{} {} {}",
                    PROMPT_INDEX.maybe_paint(format!("[{}]", index)),
                    SCORE.maybe_paint(format!("{:.3}", output.score)),
                    OUTPUT_TEXT.maybe_paint(output.output.as_str()),
                );
            }
        }
    }
}

pub(crate) async fn infer_cmd(config: &Config, args: &InferArgs) {
    let registry = match populated_registry(config) {
        Ok(registry) => registry,
        Err(err) => die!("{}", err),
    };

    let mut provider_config = config.provider_config();

    if args.dry_run {
        warn!("dry run, the gateway will not be contacted");
        provider_config.gateway = GatewayKind::Echo;
    }

    let provider = match resolve_once(
        &registry,
        args.model.as_deref(),
        config.litellm.default_model.as_deref(),
        provider_config,
    ) {
        Ok(provider) => provider,
        Err(err) => match std::error::Error::source(&err) {
            Some(source) => die!("{}: {}", err, source),
            None => die!("{}", err),
        },
    };

    let prompts = read_prompts(args);

    let mut stream = provider.infer(prompts, args.options());

    let mut index = 0;

    while let Some(group) = stream.next().await {
        match group {
            Ok(outputs) => print_group(index, &outputs, args.format),
            Err(err) => die!("{}", err),
        }

        index += 1;
    }
}
