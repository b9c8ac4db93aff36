//! The provisioning recipe — maps a validated cluster spec onto the
//! standard module pipeline.
//!
//! Module order mirrors a cluster bring-up: preflight → etcd → container
//! runtime → control plane → workers → pod network. Every step here is a
//! `CommandStep` resolved through the injected registry; the orchestration
//! core neither knows nor cares what the commands do.

use std::sync::Arc;

use anyhow::Context;

use config::{models, roles, ClusterSpec};
use engine::{HookSpec, ModuleSpec, PipelineSpec, TaskSpec};
use steps::{CommandStep, Step, StepRegistry};

/// Build the step registry for this cluster, with versions and CIDRs from
/// the (already defaulted) spec interpolated into the commands.
pub fn default_registry(spec: &ClusterSpec) -> StepRegistry {
    let version = spec
        .kubernetes
        .version
        .as_deref()
        .unwrap_or(models::DEFAULT_KUBERNETES_VERSION);
    let pod_cidr = spec
        .network
        .pod_cidr
        .as_deref()
        .unwrap_or(models::DEFAULT_POD_CIDR);
    let cni = spec
        .network
        .plugin
        .as_deref()
        .unwrap_or(models::DEFAULT_CNI_PLUGIN);

    let mut registry = StepRegistry::new();

    registry
        .register(Arc::new(CommandStep::new(
            "connectivity-check",
            "uptime",
        )))
        .register(Arc::new(CommandStep::new(
            "os-check",
            "uname -sr && nproc && free -m",
        )))
        .register(Arc::new(
            CommandStep::new(
                "disable-swap",
                "swapoff -a && sed -i '/ swap / s/^/#/' /etc/fstab",
            )
            .with_check("test \"$(swapon --noheadings | wc -l)\" -eq 0"),
        ))
        .register(Arc::new(
            CommandStep::new("install-etcd", "apt-get install -y etcd && systemctl enable --now etcd")
                .with_check("systemctl is-active --quiet etcd"),
        ))
        .register(Arc::new(
            CommandStep::new(
                "install-containerd",
                "apt-get install -y containerd && systemctl enable --now containerd",
            )
            .with_check("systemctl is-active --quiet containerd"),
        ))
        .register(Arc::new(
            CommandStep::new(
                "kubeadm-init",
                format!(
                    "kubeadm init --kubernetes-version {version} --pod-network-cidr {pod_cidr}"
                ),
            )
            .with_check("test -f /etc/kubernetes/admin.conf"),
        ))
        .register(Arc::new(
            CommandStep::new(
                "kubeadm-join",
                "kubeadm join --config /etc/kubeforge/join.yaml",
            )
            .with_check("test -f /etc/kubernetes/kubelet.conf"),
        ))
        .register(Arc::new(CommandStep::new(
            "install-cni",
            format!("kubectl apply -f /etc/kubeforge/cni/{cni}.yaml"),
        )))
        .register(Arc::new(CommandStep::new(
            "cluster-health",
            "kubectl get nodes --no-headers",
        )));

    registry
}

/// The standard provisioning pipeline for one cluster.
pub fn provisioning_pipeline(
    spec: &ClusterSpec,
    registry: &StepRegistry,
) -> anyhow::Result<PipelineSpec> {
    let pipeline = PipelineSpec::new(format!("create-cluster/{}", spec.name))
        .with_pre_run(HookSpec::new(step(registry, "connectivity-check")?))
        .with_module(
            ModuleSpec::new("preflight")
                .with_task(TaskSpec::new("os-check").with_step(step(registry, "os-check")?))
                .with_task(
                    TaskSpec::new("disable-swap").with_step(step(registry, "disable-swap")?),
                ),
        )
        .with_module(
            ModuleSpec::new("etcd").with_task(
                TaskSpec::new("install")
                    .with_step(step(registry, "install-etcd")?)
                    .on_roles([roles::ETCD])
                    .with_concurrency(1),
            ),
        )
        .with_module(
            ModuleSpec::new("container-runtime").with_task(
                TaskSpec::new("install")
                    .with_step(step(registry, "install-containerd")?)
                    .on_roles([roles::CONTROL_PLANE, roles::WORKER]),
            ),
        )
        .with_module(
            ModuleSpec::new("control-plane").with_task(
                TaskSpec::new("init")
                    .with_step(step(registry, "kubeadm-init")?)
                    .on_roles([roles::CONTROL_PLANE])
                    .with_concurrency(1),
            ),
        )
        .with_module(
            ModuleSpec::new("workers").with_task(
                TaskSpec::new("join")
                    .with_step(step(registry, "kubeadm-join")?)
                    .on_roles([roles::WORKER]),
            ),
        )
        .with_module(
            ModuleSpec::new("network")
                .with_task(
                    TaskSpec::new("install-cni")
                        .with_step(step(registry, "install-cni")?)
                        .on_roles([roles::CONTROL_PLANE])
                        .with_concurrency(1),
                )
                .with_post_run(HookSpec::new(step(registry, "cluster-health")?)),
        );

    Ok(pipeline)
}

fn step(registry: &StepRegistry, name: &str) -> anyhow::Result<Arc<dyn Step>> {
    registry
        .get(name)
        .with_context(|| format!("step '{name}' is not registered"))
}
