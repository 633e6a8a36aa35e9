use std::sync::Arc;

use async_trait::async_trait;
use core_types::{ContextResult, ErrorContext, WrapErr};
use storage::StoredObject;
use telegram::{CommandContext, CommandHandler, escape_markdown};

use crate::s3_manager::{ListObjectsInput, S3Manager};

/// Name the admin object-storage command is registered under.
pub const ADMIN_S3_COMMAND: &str = "admins_s3";

/// Objects shown per reply; the rest are only counted.
const MAX_LISTED: usize = 20;

/// `/admins_s3 list`: lists the default bucket for administrators.
pub struct S3AdminCommand {
    manager: Arc<S3Manager>,
    ctx: ErrorContext,
}

impl S3AdminCommand {
    pub fn new(manager: Arc<S3Manager>, ctx: &ErrorContext) -> Self {
        Self {
            manager,
            ctx: ctx.append("S3AdminCommand"),
        }
    }

    async fn list(&self) -> ContextResult<String> {
        let ew = self.ctx.method("List");
        let objects = self
            .manager
            .list_objects(ListObjectsInput::default())
            .await
            .wrap_err(&ew)?;
        Ok(render_listing(&objects))
    }
}

#[async_trait]
impl CommandHandler for S3AdminCommand {
    async fn handle(&self, ctx: &CommandContext) -> ContextResult<Option<String>> {
        let reply = match ctx.command.args.first().map(String::as_str) {
            None => "Command is not specified".to_string(),
            Some("list") => self.list().await?,
            Some(other) => format!("Unknown command: {}", escape_markdown(other)),
        };
        Ok(Some(reply))
    }
}

fn render_object(object: &StoredObject) -> String {
    format!(
        "Key: {}\nClass: {}\nSize: {}\nLastModified: {}",
        escape_markdown(&object.key),
        object.storage_class.as_deref().unwrap_or("-"),
        object.size,
        object
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string()),
    )
}

fn render_listing(objects: &[StoredObject]) -> String {
    if objects.is_empty() {
        return "No objects found".to_string();
    }

    let mut blocks: Vec<String> = objects.iter().take(MAX_LISTED).map(render_object).collect();
    if objects.len() > MAX_LISTED {
        blocks.push(format!("...and {} more", objects.len() - MAX_LISTED));
    }
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::S3ManagerConfig;
    use storage::{ListPageRequest, ObjectPage, ObjectStore, StorageError};
    use telegram::{Chat, Dispatcher, GENERIC_ERROR_REPLY, Message, User};

    struct Store {
        keys: Vec<&'static str>,
        fail_listing: bool,
    }

    #[async_trait]
    impl ObjectStore for Store {
        async fn list_buckets(&self) -> ContextResult<Vec<String>> {
            Ok(vec!["assets".to_string()])
        }

        async fn list_objects_page(&self, _request: ListPageRequest) -> ContextResult<ObjectPage> {
            if self.fail_listing {
                let ew = ErrorContext::new("Store").method("ListObjectsPage");
                return Err(ew.wrap(StorageError::RequestError("denied".to_string())));
            }
            Ok(ObjectPage {
                objects: self
                    .keys
                    .iter()
                    .map(|key| StoredObject {
                        key: key.to_string(),
                        size: 7,
                        last_modified: None,
                        storage_class: Some("STANDARD".to_string()),
                        e_tag: None,
                    })
                    .collect(),
                next_continuation_token: None,
            })
        }
    }

    async fn dispatcher_with(store: Store) -> Dispatcher {
        let config = S3ManagerConfig {
            bucket: "assets".to_string(),
            ..S3ManagerConfig::default()
        };
        let ctx = ErrorContext::new("Application");
        let manager = S3Manager::new(Arc::new(store), config, &ctx).await.unwrap();

        let dispatcher = Dispatcher::new(vec![1], &ctx);
        dispatcher
            .register_admin(ADMIN_S3_COMMAND, Arc::new(S3AdminCommand::new(Arc::new(manager), &ctx)))
            .await;
        dispatcher
    }

    fn message(from: i64, text: &str) -> Message {
        Message {
            message_id: 1,
            from: Some(User {
                id: from,
                is_bot: false,
                first_name: "Ann".to_string(),
                username: None,
            }),
            chat: Chat { id: 50 },
            text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn admins_get_the_object_listing() {
        let dispatcher = dispatcher_with(Store {
            keys: vec!["img/logo_small.png"],
            fail_listing: false,
        })
        .await;

        let reply = dispatcher.reply_for(&message(1, "/admins_s3 list"), None).await;
        assert_eq!(
            reply.as_deref(),
            Some("Key: img/logo\\_small.png\nClass: STANDARD\nSize: 7\nLastModified: -")
        );
    }

    #[tokio::test]
    async fn other_users_are_refused() {
        let dispatcher = dispatcher_with(Store {
            keys: vec![],
            fail_listing: false,
        })
        .await;

        let reply = dispatcher.reply_for(&message(2, "/admins_s3 list"), None).await;
        assert_eq!(
            reply.as_deref(),
            Some("Command /admins\\_s3 is available to administrators only")
        );
    }

    #[tokio::test]
    async fn missing_and_unknown_subcommands_are_explained() {
        let dispatcher = dispatcher_with(Store {
            keys: vec![],
            fail_listing: false,
        })
        .await;

        let reply = dispatcher.reply_for(&message(1, "/admins_s3"), None).await;
        assert_eq!(reply.as_deref(), Some("Command is not specified"));
        let reply = dispatcher.reply_for(&message(1, "/admins_s3 purge"), None).await;
        assert_eq!(reply.as_deref(), Some("Unknown command: purge"));
        let reply = dispatcher.reply_for(&message(1, "/admins_s3 list"), None).await;
        assert_eq!(reply.as_deref(), Some("No objects found"));
    }

    #[tokio::test]
    async fn listing_failures_get_the_generic_reply() {
        let dispatcher = dispatcher_with(Store {
            keys: vec![],
            fail_listing: true,
        })
        .await;

        let reply = dispatcher.reply_for(&message(1, "/admins_s3 list"), None).await;
        assert_eq!(reply.as_deref(), Some(GENERIC_ERROR_REPLY));
    }

    #[test]
    fn long_listings_are_truncated() {
        let objects: Vec<StoredObject> = (0..MAX_LISTED + 3)
            .map(|i| StoredObject {
                key: format!("k{i}"),
                size: 1,
                last_modified: None,
                storage_class: None,
                e_tag: None,
            })
            .collect();

        let listing = render_listing(&objects);
        assert_eq!(listing.matches("Key: ").count(), MAX_LISTED);
        assert!(listing.ends_with("...and 3 more"));
    }
}
