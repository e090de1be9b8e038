//! Guided report dialogue.
//!
//! The dialogue walks a user through provider mode, channel source, report
//! type, period and model before launching a job. It is a plain state
//! machine with no Telegram types so transitions can be tested directly.
//!
//! Inline keyboard callbacks carry `prefix:value` data, e.g. `mode:free`,
//! `period:7` or `nav:back`.

use std::fmt;

use digest_models::{ChannelSource, ModelAlias, Period, ProviderMode, ReportType, MAX_DAYS};
use digest_pipeline::ReportOptions;

use crate::error::{BotError, Result};

/// Current dialogue step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Provider,
    Source,
    ReportType,
    Period,
    /// Waiting for a typed day count.
    Days,
    Model,
}

/// Preset or manual period selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodChoice {
    Today,
    Yesterday,
    Days(u32),
    Manual,
}

/// Navigation buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Back,
    Reset,
    /// "New report" button under a finished report.
    Start,
}

/// A decoded inline keyboard callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Mode(ProviderMode),
    Source(ChannelSource),
    Type(ReportType),
    Period(PeriodChoice),
    Model(ModelAlias),
    Nav(Nav),
}

impl Choice {
    /// Decodes callback data.
    pub fn parse(data: &str) -> Result<Self> {
        let invalid = || BotError::InvalidCallback(data.to_string());
        let (prefix, value) = data.split_once(':').ok_or_else(invalid)?;

        let choice = match prefix {
            "mode" => Choice::Mode(value.parse().map_err(|_| invalid())?),
            "source" => Choice::Source(value.parse().map_err(|_| invalid())?),
            "type" => Choice::Type(value.parse().map_err(|_| invalid())?),
            "model" => Choice::Model(value.parse().map_err(|_| invalid())?),
            "period" => Choice::Period(match value {
                "today" => PeriodChoice::Today,
                "yesterday" => PeriodChoice::Yesterday,
                "manual" => PeriodChoice::Manual,
                n => PeriodChoice::Days(n.parse().map_err(|_| invalid())?),
            }),
            "nav" => Choice::Nav(match value {
                "back" => Nav::Back,
                "reset" => Nav::Reset,
                "start" => Nav::Start,
                _ => return Err(invalid()),
            }),
            _ => return Err(invalid()),
        };
        Ok(choice)
    }

    /// Encodes callback data.
    pub fn data(&self) -> String {
        match self {
            Choice::Mode(m) => format!("mode:{}", m),
            Choice::Source(s) => format!("source:{}", s),
            Choice::Type(t) => format!("type:{}", t),
            Choice::Model(m) => format!("model:{}", m),
            Choice::Period(PeriodChoice::Today) => "period:today".to_string(),
            Choice::Period(PeriodChoice::Yesterday) => "period:yesterday".to_string(),
            Choice::Period(PeriodChoice::Manual) => "period:manual".to_string(),
            Choice::Period(PeriodChoice::Days(n)) => format!("period:{}", n),
            Choice::Nav(Nav::Back) => "nav:back".to_string(),
            Choice::Nav(Nav::Reset) => "nav:reset".to_string(),
            Choice::Nav(Nav::Start) => "nav:start".to_string(),
        }
    }
}

/// Selections made so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Draft {
    pub provider_mode: Option<ProviderMode>,
    pub channel_source: Option<ChannelSource>,
    pub report_type: Option<ReportType>,
    pub period: Option<Period>,
}

/// Everything needed to start a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchRequest {
    pub period: Period,
    pub options: ReportOptions,
}

/// Outcome of feeding input to the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Show the menu for this step.
    Show(Step),
    /// All choices made; the dialogue has been reset.
    Launch(LaunchRequest),
    /// Input does not belong to the current step, e.g. a tap on an old menu.
    Stale(Step),
}

/// Rejected manual day count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaysInputError {
    NotANumber,
    OutOfRange(u32),
}

impl fmt::Display for DaysInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaysInputError::NotANumber => write!(f, "Please send a number, for example <code>3</code>."),
            DaysInputError::OutOfRange(n) => {
                write!(f, "{} is out of range. Send a number from 1 to {}.", n, MAX_DAYS)
            }
        }
    }
}

/// One user's dialogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dialogue {
    step: Step,
    draft: Draft,
}

impl Dialogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Clears all selections and returns to the first step.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Applies a keyboard choice.
    pub fn apply(&mut self, choice: Choice) -> Transition {
        match (self.step, choice) {
            (_, Choice::Nav(Nav::Reset | Nav::Start)) => {
                self.reset();
                Transition::Show(Step::Provider)
            }
            (_, Choice::Nav(Nav::Back)) => {
                self.step = self.previous_step();
                Transition::Show(self.step)
            }
            (Step::Provider, Choice::Mode(mode)) => {
                self.draft.provider_mode = Some(mode);
                self.advance(Step::Source)
            }
            (Step::Source, Choice::Source(source)) => {
                self.draft.channel_source = Some(source);
                self.advance(Step::ReportType)
            }
            (Step::ReportType, Choice::Type(report_type)) => {
                self.draft.report_type = Some(report_type);
                self.advance(Step::Period)
            }
            (Step::Period, Choice::Period(PeriodChoice::Manual)) => self.advance(Step::Days),
            (Step::Period, Choice::Period(preset)) => {
                let period = match preset {
                    PeriodChoice::Today => Period::Today,
                    PeriodChoice::Yesterday => Period::Yesterday,
                    PeriodChoice::Days(n) => match Period::days(n) {
                        Ok(period) => period,
                        Err(_) => return Transition::Stale(self.step),
                    },
                    PeriodChoice::Manual => return Transition::Stale(self.step),
                };
                self.draft.period = Some(period);
                self.advance(Step::Model)
            }
            (Step::Model, Choice::Model(alias)) => self.launch(alias),
            (step, _) => Transition::Stale(step),
        }
    }

    /// Applies a typed day count while on the `Days` step.
    pub fn enter_days(&mut self, text: &str) -> std::result::Result<Transition, DaysInputError> {
        if self.step != Step::Days {
            return Ok(Transition::Stale(self.step));
        }
        let days: u32 = text.trim().parse().map_err(|_| DaysInputError::NotANumber)?;
        let period = Period::days(days).map_err(|_| DaysInputError::OutOfRange(days))?;
        self.draft.period = Some(period);
        Ok(self.advance(Step::Model))
    }

    fn advance(&mut self, step: Step) -> Transition {
        self.step = step;
        Transition::Show(step)
    }

    fn previous_step(&self) -> Step {
        match self.step {
            Step::Provider | Step::Source => Step::Provider,
            Step::ReportType => Step::Source,
            Step::Period => Step::ReportType,
            Step::Days | Step::Model => Step::Period,
        }
    }

    fn launch(&mut self, alias: ModelAlias) -> Transition {
        let (Some(report_type), Some(period)) = (self.draft.report_type, self.draft.period) else {
            return Transition::Stale(self.step);
        };
        let options = ReportOptions::new(report_type)
            .with_model_alias(alias)
            .with_provider_mode(self.draft.provider_mode.unwrap_or_default())
            .with_channel_source(self.draft.channel_source.unwrap_or_default());
        self.reset();
        Transition::Launch(LaunchRequest { period, options })
    }
}
