//! Trigger engine facade.
//!
//! One [`TouchEngine`] per trading session. It owns the condition store,
//! the market state cache and the bracket manager, and reaches the
//! outside world only through its [`Broker`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use touch_core::{
    BidAskEvent, BracketPlan, ClientOrderId, ContractMeta, OrderEvent, OrderReceipt, OrderSpec,
    TickEvent, TriggerSpec,
};
use touch_feed::{FeedMessage, IngestOutcome, MarketState, MarketStateCache};
use touch_telemetry::Metrics;
use tracing::{debug, info, trace, warn};

use crate::bracket::{BracketOrderManager, BracketTransition};
use crate::broker::{Broker, QuoteChannel};
use crate::compiler::ConditionCompiler;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus, FiringKind};
use crate::matcher::{Firing, Matcher};
use crate::store::{CompiledCondition, ConditionId, ConditionStore, StoredCondition};

pub struct TouchEngine {
    config: EngineConfig,
    broker: Arc<dyn Broker>,
    compiler: ConditionCompiler,
    store: ConditionStore,
    cache: MarketStateCache,
    matcher: Matcher,
    brackets: BracketOrderManager,
    events: EventBus,
    /// Codes with live quote subscriptions.
    subscribed: Mutex<HashSet<String>>,
}

impl TouchEngine {
    pub fn new(config: EngineConfig, broker: Arc<dyn Broker>) -> Self {
        Self {
            brackets: BracketOrderManager::new(config.arm_policy),
            events: EventBus::new(config.event_capacity),
            config,
            broker,
            compiler: ConditionCompiler::new(),
            store: ConditionStore::new(),
            cache: MarketStateCache::new(),
            matcher: Matcher::new(),
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Compile and register a condition.
    ///
    /// Seeds market state for the contract on its first registration and
    /// subscribes its quote channels. An empty trigger registers nothing
    /// and returns `Ok(None)`.
    pub fn add_condition(
        &self,
        trigger: &TriggerSpec,
        order: &OrderSpec,
    ) -> EngineResult<Option<ConditionId>> {
        let Some(compiled) = self.compile(trigger, order)? else {
            debug!(code = %trigger.code, "Empty trigger, nothing registered");
            return Ok(None);
        };
        self.register(compiled).map(Some)
    }

    /// Like [`add_condition`](Self::add_condition), and arm `plan` once
    /// the condition's order fills.
    pub fn add_condition_with_bracket(
        &self,
        trigger: &TriggerSpec,
        order: &OrderSpec,
        plan: &BracketPlan,
    ) -> EngineResult<Option<ConditionId>> {
        validate_plan(plan)?;
        let Some(compiled) = self.compile(trigger, order)? else {
            debug!(code = %trigger.code, "Empty trigger, nothing registered");
            return Ok(None);
        };
        self.register(compiled.with_bracket(plan.clone())).map(Some)
    }

    /// Remove the first unexecuted condition equal to what `trigger` and
    /// `order` compile to. Returns whether anything was removed.
    pub fn delete_condition(&self, trigger: &TriggerSpec, order: &OrderSpec) -> EngineResult<bool> {
        self.delete(trigger, order, None)
    }

    pub fn delete_condition_with_bracket(
        &self,
        trigger: &TriggerSpec,
        order: &OrderSpec,
        plan: &BracketPlan,
    ) -> EngineResult<bool> {
        self.delete(trigger, order, Some(plan))
    }

    /// Conditions on one code, in evaluation order.
    pub fn show_conditions(&self, code: &str) -> Vec<StoredCondition> {
        self.store.list(code)
    }

    pub fn show_all_conditions(&self) -> BTreeMap<String, Vec<StoredCondition>> {
        self.store.list_all()
    }

    pub fn market_state(&self, code: &str) -> Option<MarketState> {
        self.cache.get(code)
    }

    /// Entries whose bracket is not armed yet.
    pub fn pending_brackets(&self) -> usize {
        self.brackets.pending_count()
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    /// Apply a trade tick and evaluate the code's conditions.
    pub fn on_tick(&self, tick: &TickEvent) -> Vec<Firing> {
        let outcome = self.cache.apply_tick(tick);
        if !self.accepted("tick", &tick.code, outcome) {
            return Vec::new();
        }
        self.evaluate(&tick.code)
    }

    /// Apply a quote and evaluate the code's conditions.
    pub fn on_bidask(&self, quote: &BidAskEvent) -> Vec<Firing> {
        let outcome = self.cache.apply_bidask(quote);
        if !self.accepted("bidask", &quote.code, outcome) {
            return Vec::new();
        }
        self.evaluate(&quote.code)
    }

    /// Feed an order lifecycle event to the bracket manager.
    pub fn on_order_event(&self, event: &OrderEvent) -> EngineResult<BracketTransition> {
        let transition = self.brackets.on_order_event(event, &self.store)?;
        match &transition {
            BracketTransition::Ignored => {
                trace!(seqno = %event.seqno, kind = %event.kind, "Order event not tracked");
            }
            BracketTransition::Prepared { code } => {
                self.events.send(EngineEvent::BracketPrepared {
                    code: code.clone(),
                    seqno: event.seqno.clone(),
                });
            }
            BracketTransition::Armed { id, contract } => {
                self.watch(contract)?;
                Metrics::bracket_armed(&contract.code);
                Metrics::live_conditions(&contract.code, self.store.live_count(&contract.code));
                self.events.send(EngineEvent::BracketArmed {
                    id: *id,
                    code: contract.code.clone(),
                    seqno: event.seqno.clone(),
                });
            }
        }
        Ok(transition)
    }

    /// Dispatch one parsed feed message.
    pub fn on_message(&self, message: &FeedMessage) -> EngineResult<Vec<Firing>> {
        match message {
            FeedMessage::Tick(tick) => Ok(self.on_tick(tick)),
            FeedMessage::BidAsk(quote) => Ok(self.on_bidask(quote)),
            FeedMessage::Order(event) => self.on_order_event(event).map(|_| Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Direct entry
    // ------------------------------------------------------------------

    /// Submit `entry` now and arm `plan` once it fills.
    pub fn place_with_bracket(
        &self,
        code: &str,
        entry: &OrderSpec,
        plan: &BracketPlan,
    ) -> EngineResult<OrderReceipt> {
        entry.validate()?;
        validate_plan(plan)?;
        let contract = self.lookup(code)?;

        let cloid = ClientOrderId::new();
        let receipt = self.broker.submit_order(&contract, entry, &cloid)?;
        self.brackets.track(&receipt.seqno, &contract, plan);

        Metrics::trigger_fired(code, FiringKind::Entry.as_str());
        info!(
            code = %code,
            seqno = %receipt.seqno,
            cloid = %receipt.cloid,
            order = %entry,
            "Bracket entry submitted"
        );
        self.events.send(EngineEvent::OrderSubmitted {
            condition_id: None,
            code: code.to_string(),
            kind: FiringKind::Entry,
            order: entry.clone(),
            receipt: receipt.clone(),
            timestamp: Utc::now(),
        });
        Ok(receipt)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lookup(&self, code: &str) -> EngineResult<ContractMeta> {
        self.broker
            .lookup_contract(code)
            .ok_or_else(|| EngineError::UnknownContract(code.to_string()))
    }

    fn compile(
        &self,
        trigger: &TriggerSpec,
        order: &OrderSpec,
    ) -> EngineResult<Option<CompiledCondition>> {
        order.validate()?;
        let contract = self.lookup(&trigger.code)?;
        Ok(self.compiler.compile(trigger, &contract, order)?)
    }

    fn register(&self, compiled: CompiledCondition) -> EngineResult<ConditionId> {
        self.watch(&compiled.contract)?;

        let code = compiled.code.clone();
        let thresholds = compiled.thresholds.len();
        let id = self.store.add(compiled);

        Metrics::condition_registered(&code);
        Metrics::live_conditions(&code, self.store.live_count(&code));
        info!(condition_id = %id, code = %code, thresholds, "Condition registered");
        self.events.send(EngineEvent::ConditionRegistered {
            id,
            code,
        });
        Ok(id)
    }

    fn delete(
        &self,
        trigger: &TriggerSpec,
        order: &OrderSpec,
        plan: Option<&BracketPlan>,
    ) -> EngineResult<bool> {
        if !self.store.has_conditions(&trigger.code) {
            debug!(code = %trigger.code, "No conditions to delete");
            return Ok(false);
        }
        let Some(mut compiled) = self.compile(trigger, order)? else {
            return Ok(false);
        };
        if let Some(plan) = plan {
            compiled = compiled.with_bracket(plan.clone());
        }

        let code = compiled.code.clone();
        let Some(id) = self.store.remove(&code, &compiled) else {
            debug!(code = %code, "No matching condition to delete");
            return Ok(false);
        };

        let live = self.store.live_count(&code);
        Metrics::condition_removed(&code);
        Metrics::live_conditions(&code, live);
        info!(condition_id = %id, code = %code, live, "Condition deleted");
        self.events.send(EngineEvent::ConditionRemoved {
            id,
            code: code.clone(),
        });

        if live == 0 {
            self.unwatch(&compiled.contract);
        }
        Ok(true)
    }

    /// Seed state once per code and subscribe its channels.
    fn watch(&self, contract: &ContractMeta) -> EngineResult<()> {
        self.cache
            .ensure_seeded(contract, |c| self.broker.query_snapshot(c))?;

        if !self.subscribed.lock().insert(contract.code.clone()) {
            return Ok(());
        }
        if let Err(e) = self.subscribe_channels(contract) {
            self.subscribed.lock().remove(&contract.code);
            return Err(e);
        }
        info!(code = %contract.code, quotes = self.config.subscribe_quotes, "Subscribed");
        Ok(())
    }

    fn subscribe_channels(&self, contract: &ContractMeta) -> EngineResult<()> {
        self.broker.subscribe(contract, QuoteChannel::Tick)?;
        if self.config.subscribe_quotes {
            self.broker.subscribe(contract, QuoteChannel::BidAsk)?;
        }
        Ok(())
    }

    /// Drop subscriptions for a code with nothing left to watch. Market
    /// state is kept.
    fn unwatch(&self, contract: &ContractMeta) {
        if !self.subscribed.lock().remove(&contract.code) {
            return;
        }
        let mut channels = vec![QuoteChannel::Tick];
        if self.config.subscribe_quotes {
            channels.push(QuoteChannel::BidAsk);
        }
        for channel in channels {
            if let Err(e) = self.broker.unsubscribe(contract, channel) {
                warn!(code = %contract.code, channel = %channel, error = %e, "Unsubscribe failed");
            }
        }
        info!(code = %contract.code, "Unsubscribed");
    }

    fn accepted(&self, channel: &str, code: &str, outcome: IngestOutcome) -> bool {
        if outcome.is_applied() {
            return true;
        }
        trace!(channel, code = %code, reason = outcome.as_str(), "Feed event ignored");
        Metrics::feed_ignored(channel, outcome.as_str());
        false
    }

    fn evaluate(&self, code: &str) -> Vec<Firing> {
        let Some(state) = self.cache.get(code) else {
            return Vec::new();
        };
        let firings = self.matcher.touch(code, &state, &self.store);
        if firings.is_empty() {
            return firings;
        }
        for firing in &firings {
            self.submit(firing);
        }
        Metrics::live_conditions(code, self.store.live_count(code));
        firings
    }

    /// Hand a latched firing to the broker. Failures are not retried;
    /// the condition stays executed either way.
    fn submit(&self, firing: &Firing) {
        Metrics::trigger_fired(&firing.code, firing.kind.as_str());
        let cloid = ClientOrderId::new();

        match self
            .broker
            .submit_order(&firing.contract, &firing.order, &cloid)
        {
            Ok(receipt) => {
                self.store
                    .record_execution(&firing.code, firing.condition_id, receipt.clone());
                if let Some(plan) = &firing.bracket {
                    self.brackets
                        .track(&receipt.seqno, &firing.contract, plan);
                }
                info!(
                    condition_id = %firing.condition_id,
                    code = %firing.code,
                    kind = firing.kind.as_str(),
                    seqno = %receipt.seqno,
                    cloid = %receipt.cloid,
                    order = %firing.order,
                    "Order submitted"
                );
                self.events.send(EngineEvent::OrderSubmitted {
                    condition_id: Some(firing.condition_id),
                    code: firing.code.clone(),
                    kind: firing.kind,
                    order: firing.order.clone(),
                    receipt,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(
                    condition_id = %firing.condition_id,
                    code = %firing.code,
                    cloid = %cloid,
                    error = %e,
                    "Order submission failed"
                );
                Metrics::submit_failed(&firing.code);
                self.events.send(EngineEvent::SubmitFailed {
                    condition_id: Some(firing.condition_id),
                    code: firing.code.clone(),
                    kind: firing.kind,
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn validate_plan(plan: &BracketPlan) -> EngineResult<()> {
    if plan.loss.is_some() {
        plan.loss_order.validate()?;
    }
    if plan.profit.is_some() {
        plan.profit_order.validate()?;
    }
    Ok(())
}
