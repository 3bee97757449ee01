//! Replay application.
//!
//! Registers the configured conditions and bracket entries, then pushes a
//! JSON-lines feed through the engine. Order events produced by the paper
//! broker are fed back after every feed line, the way a live session
//! would deliver them between market-data callbacks.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use tokio::sync::broadcast;
use touch_engine::{EngineEvent, TouchEngine};
use touch_feed::MessageParser;
use touch_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::paper::PaperBroker;

/// Counters for one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub lines: u64,
    pub messages: u64,
    pub malformed: u64,
    pub firings: u64,
    pub order_events: u64,
}

pub struct Application {
    config: AppConfig,
    broker: Arc<PaperBroker>,
    engine: TouchEngine,
    parser: MessageParser,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let broker = Arc::new(PaperBroker::new(
            config.paper.clone(),
            config.contracts.iter().cloned(),
            config.snapshots.clone(),
        ));
        let engine = TouchEngine::new(config.engine.clone(), broker.clone());
        Self {
            config,
            broker,
            engine,
            parser: MessageParser::new(),
        }
    }

    pub fn engine(&self) -> &TouchEngine {
        &self.engine
    }

    pub fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    /// Register configured conditions and place configured entries.
    pub fn setup(&self) -> AppResult<()> {
        for condition in &self.config.conditions {
            let id = match &condition.bracket {
                Some(plan) => {
                    self.engine
                        .add_condition_with_bracket(&condition.trigger, &condition.order, plan)?
                }
                None => self
                    .engine
                    .add_condition(&condition.trigger, &condition.order)?,
            };
            if id.is_none() {
                warn!(code = %condition.trigger.code, "Condition has no thresholds, skipped");
            }
        }

        for entry in &self.config.brackets {
            self.engine
                .place_with_bracket(&entry.code, &entry.entry, &entry.plan)?;
        }
        self.deliver_order_events();

        info!(
            conditions = self.config.conditions.len(),
            brackets = self.config.brackets.len(),
            "Startup conditions registered"
        );
        Ok(())
    }

    /// Replay every line of `reader`. Malformed lines are logged and
    /// skipped.
    pub fn replay<R: BufRead>(&self, reader: R) -> AppResult<ReplayStats> {
        let mut stats = ReplayStats::default();

        for line in reader.lines() {
            let line = line?;
            stats.lines += 1;

            let message = match self.parser.parse_line(&line) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    warn!(line = stats.lines, error = %e, "Malformed feed line");
                    stats.malformed += 1;
                    continue;
                }
            };
            stats.messages += 1;

            match self.engine.on_message(&message) {
                Ok(firings) => stats.firings += firings.len() as u64,
                Err(e) => warn!(line = stats.lines, code = %message.code(), error = %e, "Feed message rejected"),
            }
            stats.order_events += self.deliver_order_events();
        }

        Ok(stats)
    }

    /// Run the configured replay to completion.
    pub async fn run(self) -> AppResult<ReplayStats> {
        let logger = tokio::spawn(log_events(self.engine.subscribe_events()));

        self.setup()?;

        info!(feed_path = %self.config.feed_path, "Replaying feed");
        let file = File::open(&self.config.feed_path)?;
        let stats = self.replay(BufReader::new(file))?;

        info!(
            lines = stats.lines,
            messages = stats.messages,
            malformed = stats.malformed,
            firings = stats.firings,
            orders = self.broker.orders().len(),
            "Replay finished"
        );
        if self.config.print_metrics {
            info!(metrics = %Metrics::render()?, "Metrics");
        }

        // Dropping the engine closes the event bus and ends the logger.
        drop(self);
        if let Err(e) = logger.await {
            warn!(error = %e, "Event logger task failed");
        }
        Ok(stats)
    }

    fn deliver_order_events(&self) -> u64 {
        let mut delivered = 0;
        for event in self.broker.drain_events() {
            delivered += 1;
            if let Err(e) = self.engine.on_order_event(&event) {
                warn!(seqno = %event.seqno, error = %e, "Order event rejected");
            }
        }
        delivered
    }
}

async fn log_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::OrderSubmitted {
                condition_id,
                code,
                kind,
                order,
                receipt,
                ..
            }) => {
                info!(
                    condition_id = ?condition_id.map(|id| id.value()),
                    code = %code,
                    kind = kind.as_str(),
                    seqno = %receipt.seqno,
                    order = %order,
                    "Order submitted"
                );
            }
            Ok(event) => debug!(?event, "Engine event"),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
