//! Root-cause categories recognised from finding text.

use triage_core::{ComponentId, Finding};

/// A family of root causes with a description template and the steps that
/// would confirm it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootCause {
    InitContainer,
    Eviction,
    MemoryExhaustion,
    ImagePull,
    Scheduling,
    CrashLoop,
    Storage,
    Readiness,
    NodeHealth,
    ServiceAvailability,
    ReplicaShortfall,
    ErrorPropagation,
    Network,
    Latency,
    CpuSaturation,
    Configuration,
    Generic,
}

/// Keyword table, checked in order; the first match wins.
const KEYWORDS: &[(RootCause, &[&str])] = &[
    (RootCause::InitContainer, &["init container"]),
    (RootCause::Eviction, &["evicted"]),
    (RootCause::MemoryExhaustion, &["oom", "out of memory", "memory"]),
    (RootCause::ImagePull, &["imagepull", "errimagepull", "image pull", "pull image"]),
    (RootCause::Scheduling, &["failedscheduling", "insufficient", "unschedulable", "scheduling", "cannot be scheduled"]),
    (RootCause::CrashLoop, &["crashloop", "back-off", "backoff", "restart", "exit code"]),
    (RootCause::Storage, &["mount", "volume", "persistentvolume"]),
    (RootCause::Readiness, &["readiness"]),
    (RootCause::NodeHealth, &["notready", "not ready", "pressure", "kubelet"]),
    (RootCause::ServiceAvailability, &["endpoint", "unavailable service"]),
    (RootCause::ReplicaShortfall, &["replicas ready", "daemon pods ready"]),
    (RootCause::ErrorPropagation, &["error origin", "error rate", "originate"]),
    (RootCause::Network, &["connection refused", "dns", "timed out", "timeout", "unreachable"]),
    (RootCause::Latency, &["latency", "slow"]),
    (RootCause::CpuSaturation, &["cpu", "throttl"]),
    (RootCause::Configuration, &["config", "permission", "unauthorized", "forbidden"]),
];

impl RootCause {
    /// Classify a finding by its issue and evidence text.
    pub fn classify(finding: &Finding) -> Self {
        if finding.component.kind() == "Node" {
            return RootCause::NodeHealth;
        }
        let text = format!("{} {}", finding.issue, finding.evidence).to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| text.contains(w)))
            .map(|(cause, _)| *cause)
            .unwrap_or(RootCause::Generic)
    }

    /// Lower is more specific; `Generic` is least specific.
    pub fn specificity(&self) -> usize {
        KEYWORDS
            .iter()
            .position(|(cause, _)| cause == self)
            .unwrap_or(KEYWORDS.len())
    }

    pub fn describe(&self, component: &ComponentId, finding: &Finding) -> String {
        match self {
            RootCause::InitContainer => format!("Init container failure is blocking {} from starting", component),
            RootCause::Eviction => format!("{} was evicted from its node", component),
            RootCause::MemoryExhaustion => format!("Memory exhaustion in {}", component),
            RootCause::ImagePull => format!("Container image for {} cannot be pulled", component),
            RootCause::Scheduling => format!("Insufficient cluster capacity to schedule {}", component),
            RootCause::CrashLoop => format!("Application in {} is crash looping", component),
            RootCause::Storage => format!("Volume mount failure in {}", component),
            RootCause::Readiness => format!("{} never becomes ready to serve traffic", component),
            RootCause::NodeHealth => format!("{} is unhealthy", component),
            RootCause::ServiceAvailability => format!("{} has no healthy backends", component),
            RootCause::ReplicaShortfall => format!("{} is running below its desired replica count", component),
            RootCause::ErrorPropagation => format!("Errors originate in {} and propagate to callers", component),
            RootCause::Network => format!("Network connectivity failure affecting {}", component),
            RootCause::Latency => format!("Latency degradation in {}", component),
            RootCause::CpuSaturation => format!("CPU saturation in {}", component),
            RootCause::Configuration => format!("Misconfiguration of {}", component),
            RootCause::Generic => format!("{}: {}", component, finding.issue),
        }
    }

    pub fn investigation_steps(&self, component: &ComponentId) -> Vec<String> {
        let steps: &[&str] = match self {
            RootCause::InitContainer => &[
                "Inspect init container exit codes and waiting reasons",
                "Read the init container logs",
                "Verify the services and volumes the init container depends on",
            ],
            RootCause::Eviction => &[
                "Check the node conditions at the time of eviction",
                "Compare pod resource requests with actual usage",
            ],
            RootCause::MemoryExhaustion => &[
                "Compare container memory usage with its limit",
                "Check for OOMKilled terminations in the pod status",
                "Review recent changes to memory limits or workload size",
            ],
            RootCause::ImagePull => &[
                "Verify the image name and tag exist in the registry",
                "Check image pull secrets and registry credentials",
            ],
            RootCause::Scheduling => &[
                "Review FailedScheduling events for the unmet constraint",
                "Compare pod resource requests with allocatable node capacity",
                "Check node selectors, taints and affinity rules",
            ],
            RootCause::CrashLoop => &[
                "Read the logs of the previous container instance",
                "Check the container exit code and termination reason",
                "Review liveness probe configuration",
            ],
            RootCause::Storage => &[
                "Check PersistentVolumeClaim binding status",
                "Review FailedMount and FailedAttachVolume events",
            ],
            RootCause::Readiness => &[
                "Check the readiness endpoint responds inside the probe timeout",
                "Read the container logs around failed readiness checks",
            ],
            RootCause::NodeHealth => &[
                "Inspect node conditions and kubelet status",
                "Check disk, memory and PID pressure on the node",
            ],
            RootCause::ServiceAvailability => &[
                "Verify the service selector matches running pods",
                "Check readiness probes of the backing pods",
            ],
            RootCause::ReplicaShortfall => &[
                "Find the pods owned by the workload that are not ready",
                "Review the rollout status and recent events of the workload",
            ],
            RootCause::ErrorPropagation => &[
                "Inspect failing traces starting at the originating service",
                "Read the originating service's logs around the failures",
            ],
            RootCause::Network => &[
                "Check that the target service has ready endpoints",
                "Verify DNS resolution and network policies",
            ],
            RootCause::Latency => &[
                "Compare current latency with the service's baseline",
                "Check downstream dependencies for slow spans",
            ],
            RootCause::CpuSaturation => &[
                "Compare CPU usage with requests and limits",
                "Check for CPU throttling and consider scaling out",
            ],
            RootCause::Configuration => &[
                "Review ConfigMaps, Secrets and RBAC bindings used by the workload",
            ],
            RootCause::Generic => &["Review recent events and logs for the component"],
        };
        let mut out: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
        out.push(format!("Re-run the diagnostic agents to confirm the state of {}", component));
        out
    }
}
