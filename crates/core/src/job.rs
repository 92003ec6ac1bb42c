//! Build/deploy job payloads submitted to `/run`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_REGISTRY: &str = "lenovo:8443";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_REVISION: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobSource {
    Git {
        repo_url: String,
        revision: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        git_username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        git_token: Option<String>,
    },
    Zip {
        zip_url: String,
    },
    Local {
        local_path: String,
    },
}

impl JobSource {
    /// Container port used when the operator leaves it unset.
    pub fn default_container_port(&self) -> u16 {
        match self {
            JobSource::Zip { .. } => 8080,
            JobSource::Git { .. } | JobSource::Local { .. } => 3000,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JobSource::Git { .. } => "git",
            JobSource::Zip { .. } => "zip",
            JobSource::Local { .. } => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub project: String,
    pub tag: String,
    pub registry: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub app_name: String,
    pub workspace: String,
    pub source: JobSource,
    pub image: ImageSpec,
    pub deploy: DeploySpec,
}

impl JobSpec {
    /// Build a job with the runner defaults: image project falls back to the
    /// app name, tag to `latest`, registry to [`DEFAULT_REGISTRY`] and the
    /// container port to the source's default.
    pub fn new(app_name: &str, workspace: &str, source: JobSource) -> Self {
        let container_port = source.default_container_port();
        Self {
            app_name: app_name.trim().to_string(),
            workspace: workspace.trim().to_string(),
            image: ImageSpec {
                project: app_name.trim().to_string(),
                tag: DEFAULT_TAG.to_string(),
                registry: DEFAULT_REGISTRY.to_string(),
            },
            deploy: DeploySpec { container_port },
            source,
        }
    }

    pub fn git(app_name: &str, workspace: &str, repo_url: &str, revision: Option<&str>) -> Self {
        let revision = revision.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REVISION);
        Self::new(
            app_name,
            workspace,
            JobSource::Git { repo_url: repo_url.trim().to_string(), revision: revision.to_string(), git_username: None, git_token: None },
        )
    }

    pub fn zip(app_name: &str, workspace: &str, zip_url: &str) -> Self {
        Self::new(app_name, workspace, JobSource::Zip { zip_url: zip_url.trim().to_string() })
    }

    pub fn local(app_name: &str, workspace: &str, local_path: &str) -> Self {
        Self::new(app_name, workspace, JobSource::Local { local_path: local_path.trim().to_string() })
    }

    /// Attach git credentials; blank values are left out of the payload.
    pub fn with_git_credentials(mut self, username: Option<&str>, token: Option<&str>) -> Self {
        if let JobSource::Git { git_username, git_token, .. } = &mut self.source {
            *git_username = username.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
            *git_token = token.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        }
        self
    }

    /// Override image fields; blank values keep the defaults.
    pub fn with_image(mut self, project: Option<&str>, tag: Option<&str>, registry: Option<&str>) -> Self {
        let pick = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        if let Some(p) = pick(project) { self.image.project = p; }
        if let Some(t) = pick(tag) { self.image.tag = t; }
        if let Some(r) = pick(registry) { self.image.registry = r; }
        self
    }

    /// Override the container port; `0` keeps the default.
    pub fn with_container_port(mut self, port: Option<u16>) -> Self {
        if let Some(p) = port.filter(|p| *p != 0) {
            self.deploy.container_port = p;
        }
        self
    }

    pub fn sample_git() -> Self {
        Self::git("demoapp", "ws-demo", "https://github.com/mehmetalpkarabulut/Dev", Some("main"))
    }

    pub fn sample_zip() -> Self {
        Self::zip("demoapp", "ws-demo", "http://zip-server.tekton-pipelines.svc.cluster.local:8080/app.zip")
    }

    pub fn sample_local() -> Self {
        Self::local("demoapp", "ws-demo", "/mnt/projects/demoapp")
    }
}
