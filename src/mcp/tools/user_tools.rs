//! User administration tools
//!
//! | Tool                   | Arguments                              |
//! |------------------------|----------------------------------------|
//! | `user_list`            | `limit?`, `offset?`                    |
//! | `user_get_by_id`       | `userId`                               |
//! | `user_get_by_email`    | `email`                                |
//! | `user_create`          | `email`, `password`, `emailVerified?`  |
//! | `user_update_email`    | `userId`, `email`                      |
//! | `user_update_password` | `userId`, `password`                   |
//! | `user_delete`          | `userId`                               |
//!
//! Password hashes never appear in tool output.

use super::parse_args;
use crate::error::ToolError;
use crate::mcp::registry::ToolDefinition;
use crate::mcp::schema::{ObjectSchema, Schema};
use crate::services::user_service::{
    CreateUserRequest, UpdateEmailRequest, UpdatePasswordRequest, UserService, UserServiceError,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const MAX_PAGE: i64 = 100;

pub fn tools(service: Arc<UserService>) -> Vec<ToolDefinition> {
    vec![
        user_list(Arc::clone(&service)),
        user_get_by_id(Arc::clone(&service)),
        user_get_by_email(Arc::clone(&service)),
        user_create(Arc::clone(&service)),
        user_update_email(Arc::clone(&service)),
        user_update_password(Arc::clone(&service)),
        user_delete(service),
    ]
}

fn user_schema() -> ObjectSchema {
    ObjectSchema::new()
        .required("id", Schema::integer())
        .required("email", Schema::string().format("email"))
        .required("emailVerified", Schema::boolean())
        .optional("createdAt", Schema::string().nullable())
        .optional("updatedAt", Schema::string().nullable())
}

fn user_id_field() -> Schema {
    Schema::integer()
        .range(Some(1), None)
        .describe("Numeric user id")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListArgs {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

fn user_list(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_list",
        "List users",
        "Lists registered users in creation order",
        ObjectSchema::new()
            .optional(
                "limit",
                Schema::integer()
                    .range(Some(1), Some(MAX_PAGE))
                    .describe("Maximum number of users to return"),
            )
            .optional(
                "offset",
                Schema::integer()
                    .range(Some(0), None)
                    .default_value(json!(0)),
            ),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: ListArgs = parse_args(args)?;
                let limit = args.limit.map(|l| l.clamp(1, MAX_PAGE));
                let offset = args.offset.map(|o| o.max(0));
                let users = service.list_users(limit, offset).await?;
                Ok::<_, ToolError>(json!({ "count": users.len(), "users": users }))
            }
        },
    )
    .with_output_schema(
        ObjectSchema::new()
            .required("count", Schema::integer())
            .required("users", Schema::array(Schema::object(user_schema()))),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UserIdArgs {
    user_id: i64,
}

fn user_get_by_id(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_get_by_id",
        "Get user by id",
        "Fetches one user by numeric id",
        ObjectSchema::new().required("userId", user_id_field()),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: UserIdArgs = parse_args(args)?;
                let user = service.get_user(args.user_id).await?;
                Ok::<_, ToolError>(json!(user))
            }
        },
    )
    .with_output_schema(user_schema())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EmailArgs {
    email: String,
}

fn user_get_by_email(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_get_by_email",
        "Get user by email",
        "Fetches one user by email address (case-insensitive)",
        ObjectSchema::new().required("email", Schema::string().format("email")),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: EmailArgs = parse_args(args)?;
                let email = args.email.trim().to_lowercase();
                let user = service
                    .find_user_by_email(&email)
                    .await?
                    .ok_or(UserServiceError::UserNotFound)?;
                Ok::<_, ToolError>(json!(user))
            }
        },
    )
    .with_output_schema(user_schema())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateArgs {
    email: String,
    password: String,
    #[serde(default)]
    email_verified: bool,
}

fn user_create(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_create",
        "Create user",
        "Registers a new user with a password of at least 8 characters",
        ObjectSchema::new()
            .required("email", Schema::string().format("email"))
            .required("password", Schema::string().min_length(8))
            .optional(
                "emailVerified",
                Schema::boolean().default_value(json!(false)),
            ),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: CreateArgs = parse_args(args)?;
                let user = service
                    .create_user(CreateUserRequest {
                        email: args.email,
                        password: args.password,
                        password_confirm: None,
                        email_verified: args.email_verified,
                    })
                    .await?;
                Ok::<_, ToolError>(json!(user))
            }
        },
    )
    .with_output_schema(user_schema())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateEmailArgs {
    user_id: i64,
    email: String,
}

fn user_update_email(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_update_email",
        "Update user email",
        "Changes a user's email address",
        ObjectSchema::new()
            .required("userId", user_id_field())
            .required("email", Schema::string().format("email")),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: UpdateEmailArgs = parse_args(args)?;
                let user = service
                    .update_email(UpdateEmailRequest {
                        user_id: args.user_id,
                        new_email: args.email,
                    })
                    .await?;
                Ok::<_, ToolError>(json!(user))
            }
        },
    )
    .with_output_schema(user_schema())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdatePasswordArgs {
    user_id: i64,
    password: String,
}

fn user_update_password(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_update_password",
        "Update user password",
        "Replaces a user's password",
        ObjectSchema::new()
            .required("userId", user_id_field())
            .required("password", Schema::string().min_length(8)),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: UpdatePasswordArgs = parse_args(args)?;
                service
                    .update_password(UpdatePasswordRequest {
                        user_id: args.user_id,
                        new_password: args.password,
                        new_password_confirm: None,
                    })
                    .await?;
                Ok::<_, ToolError>(json!({ "updated": true, "userId": args.user_id }))
            }
        },
    )
    .with_output_schema(
        ObjectSchema::new()
            .required("updated", Schema::boolean())
            .required("userId", Schema::integer()),
    )
}

fn user_delete(service: Arc<UserService>) -> ToolDefinition {
    ToolDefinition::new(
        "user_delete",
        "Delete user",
        "Removes a user; their search history is kept without an owner",
        ObjectSchema::new().required("userId", user_id_field()),
        move |args| {
            let service = Arc::clone(&service);
            async move {
                let args: UserIdArgs = parse_args(args)?;
                service.delete_user(args.user_id).await?;
                tracing::info!(user_id = args.user_id, "User deleted through MCP");
                Ok::<_, ToolError>(json!({ "deleted": true, "userId": args.user_id }))
            }
        },
    )
    .with_output_schema(
        ObjectSchema::new()
            .required("deleted", Schema::boolean())
            .required("userId", Schema::integer()),
    )
}
