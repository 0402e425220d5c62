// ABOUTME: DaemonRegistry: registry operations performed through a container runtime.
// ABOUTME: Same path the engine CLI takes; transient failures retried with backoff.

use super::{
    Credential, LocalArtifact, PublishedRef, RegistryClient, RegistryError, Session, registry_host,
};
use crate::cancel::CancelToken;
use crate::retry::{RetryError, RetryPolicy};
use crate::runtime::{ImageOps, RuntimeInfo};
use crate::types::{ArtifactReference, ImageRef};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Client for one repository; `authenticate` proves the credential against it.
pub struct DaemonRegistry<R> {
    runtime: Arc<R>,
    repository: ImageRef,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl<R> DaemonRegistry<R>
where
    R: ImageOps + RuntimeInfo,
{
    pub fn new(runtime: Arc<R>, repository: ImageRef, policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            runtime,
            repository,
            policy,
            cancel,
        }
    }

    async fn retrying<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, RegistryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        self.policy
            .run(operation, &self.cancel, op)
            .await
            .map_err(|e| match e {
                RetryError::Permanent(err) => err,
                RetryError::Exhausted { attempts, last } => RegistryError::Exhausted {
                    operation,
                    attempts,
                    last: Box::new(last),
                },
                RetryError::Cancelled { .. } => RegistryError::Cancelled(operation),
            })
    }

    fn check_host(session: &Session, image: &ImageRef) -> Result<(), RegistryError> {
        let host = registry_host(image);
        if session.credential().is_bound_to(host) {
            Ok(())
        } else {
            Err(RegistryError::HostMismatch {
                bound: session.host().to_string(),
                host: host.to_string(),
            })
        }
    }
}

#[async_trait]
impl<R> RegistryClient for DaemonRegistry<R>
where
    R: ImageOps + RuntimeInfo + 'static,
{
    async fn authenticate(
        &self,
        host: &str,
        credential: Arc<Credential>,
    ) -> Result<Session, RegistryError> {
        if !credential.is_bound_to(host) {
            return Err(RegistryError::HostMismatch {
                bound: credential.host().to_string(),
                host: host.to_string(),
            });
        }

        let served = registry_host(&self.repository);
        if !served.eq_ignore_ascii_case(host) {
            return Err(RegistryError::HostMismatch {
                bound: host.to_string(),
                host: served.to_string(),
            });
        }
        let auth = credential.auth();

        self.retrying("authenticate", |_| {
            let auth = auth.as_ref();
            async move {
                self.runtime
                    .ping()
                    .await
                    .map_err(|e| RegistryError::Auth {
                        host: host.to_string(),
                        reason: e.to_string(),
                        transient: true,
                    })?;
                self.runtime
                    .check_access(&self.repository, auth)
                    .await
                    .map_err(|e| RegistryError::Auth {
                        host: host.to_string(),
                        transient: e.is_transient(),
                        reason: e.to_string(),
                    })
            }
        })
        .await?;

        tracing::debug!(
            host,
            anonymous = credential.is_anonymous(),
            "registry session ready"
        );
        Ok(Session {
            host: host.to_string(),
            credential,
        })
    }

    async fn push(
        &self,
        session: &Session,
        artifact: &ArtifactReference,
    ) -> Result<PublishedRef, RegistryError> {
        let tagged = artifact.tagged();
        Self::check_host(session, &tagged)?;
        let auth = session.credential().auth();

        let digest = self
            .retrying("push", |attempt| {
                let tagged = &tagged;
                let auth = auth.as_ref();
                async move {
                    tracing::debug!(image = %tagged, attempt, "pushing");
                    self.runtime
                        .push_image(tagged, auth)
                        .await
                        .map_err(|source| RegistryError::Push {
                            reference: tagged.to_string(),
                            source,
                        })
                }
            })
            .await?;

        // Engines report the manifest digest, which differs from the local image id.
        tracing::info!(image = %tagged, built = %artifact.digest(), %digest, "published");
        Ok(PublishedRef {
            host: session.host().to_string(),
            artifact: ArtifactReference::new(&tagged, artifact.tag(), digest),
        })
    }

    async fn pull(
        &self,
        session: &Session,
        reference: &ImageRef,
    ) -> Result<LocalArtifact, RegistryError> {
        Self::check_host(session, reference)?;
        let auth = session.credential().auth();

        self.retrying("pull", |_| {
            let auth = auth.as_ref();
            async move {
                self.runtime
                    .pull_image(reference, auth)
                    .await
                    .map_err(|source| RegistryError::Pull {
                        reference: reference.to_string(),
                        source,
                    })
            }
        })
        .await?;

        Ok(LocalArtifact {
            reference: reference.clone(),
        })
    }

    async fn promote(
        &self,
        session: &Session,
        published: &PublishedRef,
        tag: &str,
    ) -> Result<PublishedRef, RegistryError> {
        let pinned = published.pinned();
        Self::check_host(session, &pinned)?;
        let alias = pinned.with_tag(tag).map_err(|e| RegistryError::Promote {
            reference: format!("{}:{}", pinned.repository(), tag),
            source: crate::runtime::ImageError::Runtime(e.to_string()),
        })?;
        let auth = session.credential().auth();

        // Make sure the local daemon can resolve the digest before aliasing it.
        let present = self
            .runtime
            .image_exists(&pinned)
            .await
            .map_err(|source| RegistryError::Promote {
                reference: pinned.to_string(),
                source,
            })?;
        if !present {
            self.pull(session, &pinned).await?;
        }

        self.runtime
            .tag_image(&pinned, &alias)
            .await
            .map_err(|source| RegistryError::Promote {
                reference: alias.to_string(),
                source,
            })?;

        // The manifest is already there, so this push only writes the tag.
        let digest = self
            .retrying("promote", |_| {
                let alias = &alias;
                let auth = auth.as_ref();
                async move {
                    self.runtime
                        .push_image(alias, auth)
                        .await
                        .map_err(|source| RegistryError::Promote {
                            reference: alias.to_string(),
                            source,
                        })
                }
            })
            .await?;

        if &digest != published.digest() {
            return Err(RegistryError::DigestMismatch {
                reference: alias.to_string(),
                expected: published.digest().clone(),
                actual: digest,
            });
        }

        tracing::info!(tag, digest = %digest, "promoted");
        Ok(PublishedRef {
            host: published.host.clone(),
            artifact: published.artifact.retagged(tag),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::InMemoryRuntime;
    use crate::types::Digest;

    fn registry() -> (Arc<InMemoryRuntime>, DaemonRegistry<InMemoryRuntime>) {
        let runtime = Arc::new(InMemoryRuntime::new());
        let client = DaemonRegistry::new(
            runtime.clone(),
            ImageRef::parse("registry.local/acme/web").unwrap(),
            RetryPolicy::default(),
            CancelToken::new(),
        );
        (runtime, client)
    }

    fn credential(user: &str, secret: &str) -> Arc<Credential> {
        Arc::new(Credential::basic("registry.local", user, secret))
    }

    #[tokio::test]
    async fn wrong_password_fails_authentication() {
        let (runtime, client) = registry();
        runtime.registry().require_credentials("ci", "s3cret");

        let err = client
            .authenticate("registry.local", credential("ci", "wrong"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RegistryError::Auth { transient: false, .. }),
            "got {err:?}"
        );

        client
            .authenticate("registry.local", credential("ci", "s3cret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn session_for_a_different_registry_is_refused() {
        let (_, client) = registry();
        let err = client
            .authenticate("ghcr.io", Arc::new(Credential::anonymous("ghcr.io")))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::HostMismatch { .. }));
    }

    #[tokio::test]
    async fn promote_surfaces_a_failed_local_lookup() {
        let (runtime, client) = registry();
        let image = ImageRef::parse("registry.local/acme/web").unwrap();
        let artifact = ArtifactReference::new(&image, "build-1", Digest::parse("sha:abc123").unwrap());
        runtime.load_image(&artifact.tagged(), artifact.digest().clone());
        let session = client
            .authenticate("registry.local", Arc::new(Credential::anonymous("registry.local")))
            .await
            .unwrap();
        let published = client.push(&session, &artifact).await.unwrap();

        runtime.set_unreachable(true);
        let err = client.promote(&session, &published, "latest").await.unwrap_err();
        assert!(
            matches!(err, RegistryError::Promote { ref reference, .. } if reference.ends_with("@sha:abc123")),
            "got {err:?}"
        );
        assert_eq!(runtime.registry().resolve("registry.local/acme/web", "latest"), None);
    }

    #[tokio::test]
    async fn credential_for_other_host_is_refused() {
        let (_, client) = registry();
        let err = client
            .authenticate("registry.local", Arc::new(Credential::anonymous("ghcr.io")))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::HostMismatch { .. }));
    }

    #[tokio::test]
    async fn promote_moves_tag_without_upload() {
        let (runtime, client) = registry();
        let image = ImageRef::parse("registry.local/acme/web").unwrap();
        let artifact = ArtifactReference::new(&image, "build-1", Digest::parse("sha:abc123").unwrap());
        runtime.load_image(&artifact.tagged(), artifact.digest().clone());

        let session = client
            .authenticate("registry.local", Arc::new(Credential::anonymous("registry.local")))
            .await
            .unwrap();
        let published = client.push(&session, &artifact).await.unwrap();
        let promoted = client.promote(&session, &published, "latest").await.unwrap();

        assert_eq!(promoted.digest(), published.digest());
        assert_eq!(runtime.registry().uploads(), 1);
        assert_eq!(
            runtime.registry().resolve("registry.local/acme/web", "latest"),
            Some(published.digest().clone())
        );
    }
}
