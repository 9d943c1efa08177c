//! Ledgerwatch — headless multi-chain explorer feed. Runs the chain_feed aggregator.

use std::process::ExitCode;

use chain_feed::prelude::*;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut builder = AggregatorBuilder::new().from_env();
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse::<ChainId>() {
            Ok(chain) => builder = builder.active(chain),
            Err(err) => {
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }
    let switch_every = std::env::var("SWITCH_EVERY")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&secs| secs > 0);

    let aggregator = match builder.start() {
        Ok(aggregator) => aggregator,
        Err(err) => {
            log::error!("failed to start aggregator: {err}");
            return ExitCode::FAILURE;
        }
    };
    for chain in ChainId::ALL {
        if let Some(mode) = aggregator.mode(chain) {
            log::info!("{chain}: {mode}");
        }
    }

    let ticks = aggregator.subscribe_ticks();
    while let Ok(tick) = ticks.recv() {
        if let Some(every) = switch_every {
            if tick.seq % every == 0 {
                let next = next_chain(aggregator.active());
                aggregator.switch_chain(next);
            }
        }
        log_view(&aggregator.current_view());
    }
    ExitCode::SUCCESS
}

fn next_chain(current: ChainId) -> ChainId {
    let position = ChainId::ALL
        .iter()
        .position(|&chain| chain == current)
        .unwrap_or(0);
    ChainId::ALL[(position + 1) % ChainId::ALL.len()]
}

fn log_view(view: &ChainView) {
    let tip = view
        .blocks
        .first()
        .map(|b| format!("#{} ({})", b.block.height, b.age))
        .unwrap_or_else(|| "-".to_string());
    let stats = &view.stats;
    log::info!(
        "{} [{:?}{}] tip {tip} | {} blocks, {} txs | tps {:.1} ({}) | nodes {} ({}) | block time {:.1}s ({}) | gas {}",
        view.chain,
        view.source,
        if view.loading { ", loading" } else { "" },
        view.blocks.len(),
        view.transactions.len(),
        stats.tps,
        stats.tps_change,
        stats.nodes,
        stats.nodes_change,
        stats.block_time_secs,
        stats.block_time_change,
        stats.gas_price,
    );
    if let Some(err) = &view.error {
        log::warn!("{}: {err}", view.chain);
    }
    if let Some(tx) = view.transactions.first() {
        log::debug!(
            "latest tx {} {} -> {} {} ({})",
            tx.transaction.hash,
            tx.transaction.from,
            tx.transaction.to,
            tx.transaction.value,
            tx.age
        );
    }
    if let Some(contract) = view.selected() {
        log::debug!("contract: {}: {}", contract.name, contract.description);
    }
}
