use std::time::Duration;

use crate::registry::LabelSet;

/// Interval used when a job does not configure one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
/// Maximum allowed interval (100 years).
pub const MAX_INTERVAL: Duration = Duration::from_secs(100 * 365 * 86_400);
/// Help text used when a job does not configure one.
pub const DEFAULT_HELP: &str = "Generic metric HELP";

/// Label distinguishing the values of one job's output.
pub const COMPONENT_LABEL: &str = "component";
/// Name a user supplied `component` label is moved to.
pub const USER_COMPONENT_LABEL: &str = "user_defined_component";
/// Component value for scalar output and for error counts.
pub const MAIN_COMPONENT: &str = "main";

/// One configured command, run on a fixed interval.
///
/// Immutable once built. The base labels never contain `component`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub interval: Duration,
    pub metric: String,
    pub help: String,
    pub labels: LabelSet,
}

impl JobSpec {
    /// Create a new builder for JobSpec
    pub fn builder(command: impl Into<String>, metric: impl Into<String>) -> JobSpecBuilder {
        let metric = metric.into();
        JobSpecBuilder {
            name: metric.clone(),
            command: command.into(),
            args: Vec::new(),
            interval: DEFAULT_INTERVAL,
            metric,
            help: DEFAULT_HELP.to_string(),
            labels: LabelSet::new(),
        }
    }

    /// Program and arguments: the command followed by its arguments, joined
    /// and split again on whitespace.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect()
    }

    /// The command line as it is logged.
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }

    /// Name of this job's error counter.
    pub fn error_metric(&self) -> String {
        format!("{}_errors_total", self.metric)
    }

    /// Label names shared by the job's gauge and error counter.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(COMPONENT_LABEL))
    }

    /// Base labels plus `component`.
    pub fn labels_with_component(&self, component: &str) -> LabelSet {
        let mut labels = self.labels.clone();
        labels.insert(COMPONENT_LABEL.to_string(), component.to_string());
        labels
    }
}

/// Builder for JobSpec
pub struct JobSpecBuilder {
    name: String,
    command: String,
    args: Vec<String>,
    interval: Duration,
    metric: String,
    help: String,
    labels: LabelSet,
}

impl JobSpecBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Interval is clamped to a minimum of 1 second.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn build(mut self) -> JobSpec {
        if self.interval < MIN_INTERVAL {
            tracing::warn!(
                job = %self.name,
                interval = ?self.interval,
                min_interval = ?MIN_INTERVAL,
                "Interval is less than minimum allowed. Using minimum interval."
            );
            self.interval = MIN_INTERVAL;
        } else if self.interval > MAX_INTERVAL {
            tracing::warn!(
                job = %self.name,
                interval = ?self.interval,
                max_interval = ?MAX_INTERVAL,
                "Interval is greater than maximum allowed. Using maximum interval."
            );
            self.interval = MAX_INTERVAL;
        }
        reserve_component_label(&self.name, &mut self.labels);

        JobSpec {
            name: self.name,
            command: self.command,
            args: self.args,
            interval: self.interval,
            metric: self.metric,
            help: self.help,
            labels: self.labels,
        }
    }
}

/// Merge global labels under a job's own labels; the job wins on collisions.
pub fn merge_labels(global: &LabelSet, local: &LabelSet) -> LabelSet {
    let mut merged = global.clone();
    merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Move a configured `component` label to `user_defined_component`.
///
/// Returns true if the label was renamed.
pub fn reserve_component_label(job: &str, labels: &mut LabelSet) -> bool {
    let Some(value) = labels.remove(COMPONENT_LABEL) else {
        return false;
    };
    tracing::warn!(
        job = %job,
        "Found <{}> label defined in config, renamed to <{}>",
        COMPONENT_LABEL,
        USER_COMPONENT_LABEL
    );
    labels.insert(USER_COMPONENT_LABEL.to_string(), value);
    true
}
