//! 用户认证和授权
//!
//! 密码使用 Argon2 哈希，访问令牌为 HS256 签名的 JWT。
//! 认证中间件把令牌解析为 [`AuthUser`] 放入请求扩展，处理器再按角色校验。

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use dental_core::{CreateUserRequest, DentalError, Result, User, UserRole};
use dental_database::UserRepository;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::ApiJson;

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,      // 用户ID
    username: String, // 用户名
    role: String,     // 角色
    exp: usize,       // 过期时间
    iat: usize,       // 签发时间
    jti: String,      // JWT ID
}

/// 已认证的调用者
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    /// 要求调用者属于给定角色之一
    pub fn require_any(&self, roles: &[UserRole]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(DentalError::Permission(format!(
                "role {:?} is not allowed to perform this action",
                self.role
            )))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        self.require_any(&[UserRole::Admin])
    }

    /// 删除操作仅限管理员和牙医
    pub fn require_delete(&self) -> Result<()> {
        self.require_any(&[UserRole::Admin, UserRole::Dentist])
    }
}

/// 认证服务
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_hours: i64,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token_expiry_hours", &self.token_expiry_hours)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, jwt_secret: &str, token_expiry_hours: i64) -> Self {
        Self {
            users,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_expiry_hours,
        }
    }

    /// 创建用户
    pub async fn register(&self, request: CreateUserRequest) -> Result<User> {
        request.validate()?;
        if self
            .users
            .get_user_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(DentalError::Conflict(format!(
                "username '{}' is already taken",
                request.username
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: request.username,
            email: request.email.trim().to_lowercase(),
            full_name: request.full_name.trim().to_string(),
            role: request.role,
            password_hash: hash_password(&request.password)?,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert_user(&user).await?;

        info!(user_id = %user.id, username = %user.username, role = ?user.role, "Created user");
        Ok(user)
    }

    /// 没有任何用户时创建初始管理员
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<User>> {
        if self.users.count_users().await? > 0 {
            return Ok(None);
        }

        let user = self
            .register(CreateUserRequest {
                username: username.to_string(),
                email: email.to_string(),
                full_name: "System Administrator".to_string(),
                role: UserRole::Admin,
                password: password.to_string(),
            })
            .await?;
        warn!(username = %user.username, "Created bootstrap administrator, change its password");
        Ok(Some(user))
    }

    /// 用户登录
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let invalid = || DentalError::Unauthorized("invalid username or password".to_string());

        let mut user = self
            .users
            .get_user_by_username(&request.username)
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(&request.password, &user.password_hash)? {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(DentalError::Unauthorized("account is disabled".to_string()));
        }

        let (token, expires_at) = self.issue_token(&user)?;
        let now = Utc::now();
        user.last_login_at = Some(now);
        user.updated_at = now;
        self.users.update_user(&user).await?;

        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            expires_at,
            user,
        })
    }

    /// 签发令牌
    pub fn issue_token(&self, user: &User) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.token_expiry_hours);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| DentalError::Internal(format!("failed to sign token: {}", e)))?;
        Ok((token, exp))
    }

    /// 验证令牌，并确认用户仍然存在且可用
    pub async fn verify_token(&self, token: &str) -> Result<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| DentalError::Unauthorized(format!("invalid token: {}", e)))?;
        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| DentalError::Unauthorized("invalid token subject".to_string()))?;

        let user = self
            .users
            .get_user(id)
            .await?
            .ok_or_else(|| DentalError::Unauthorized("user no longer exists".to_string()))?;
        if !user.is_active {
            return Err(DentalError::Unauthorized("account is disabled".to_string()));
        }

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| DentalError::not_found("user", id))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }
}

/// Argon2 哈希
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DentalError::Internal(format!("failed to hash password: {}", e)))
}

/// 校验密码，哈希格式错误视为内部错误
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| DentalError::Internal(format!("stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 认证中间件
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DentalError::Unauthorized("missing bearer token".to_string()))?;

    let user = auth_service.verify_token(token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// 登录处理器
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("Login attempt for user: {}", request.username);

    match auth_service.login(request).await {
        Ok(response) => {
            info!("User logged in successfully: {}", response.user.username);
            Ok(Json(response))
        }
        Err(e) => {
            warn!("Login failed: {}", e);
            Err(e.into())
        }
    }
}

/// 获取当前用户信息
pub async fn get_current_user(
    State(auth_service): State<Arc<AuthService>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    Ok(Json(auth_service.get_user(user.id).await?))
}

/// 获取所有用户（仅管理员）
pub async fn list_users_handler(
    State(auth_service): State<Arc<AuthService>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<User>>> {
    user.require_admin()?;
    Ok(Json(auth_service.list_users().await?))
}

/// 创建用户（仅管理员）
pub async fn create_user_handler(
    State(auth_service): State<Arc<AuthService>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let created = auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dental_database::InMemoryStore;

    const SECRET: &str = "test-secret-with-at-least-32-characters!";

    fn service() -> AuthService {
        AuthService::new(Arc::new(InMemoryStore::new()), SECRET, 1)
    }

    fn user_request(username: &str, role: UserRole) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: format!("{}@clinic.test", username),
            full_name: "Test User".to_string(),
            role,
            password: "correct-horse".to_string(),
        }
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong-pass", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_login_and_verify() {
        let auth = service();
        let created = auth
            .register(user_request("dr.molar", UserRole::Dentist))
            .await
            .unwrap();

        let response = auth
            .login(LoginRequest {
                username: "dr.molar".to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();
        assert!(response.user.last_login_at.is_some());

        let caller = auth.verify_token(&response.token).await.unwrap();
        assert_eq!(caller.id, created.id);
        assert_eq!(caller.role, UserRole::Dentist);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let auth = service();
        auth.register(user_request("front.desk", UserRole::Receptionist))
            .await
            .unwrap();
        let err = auth
            .login(LoginRequest {
                username: "front.desk".to_string(),
                password: "nope-nope".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DentalError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_token_from_other_secret_is_rejected() {
        let auth = service();
        let user = auth
            .register(user_request("hygienist", UserRole::Hygienist))
            .await
            .unwrap();
        let other = AuthService::new(
            Arc::new(InMemoryStore::new()),
            "another-secret-with-at-least-32-characters",
            1,
        );
        let (token, _) = other.issue_token(&user).unwrap();
        assert!(matches!(
            auth.verify_token(&token).await,
            Err(DentalError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_once() {
        let auth = service();
        let admin = auth
            .bootstrap_admin("admin", "admin@clinic.test", "admin-password")
            .await
            .unwrap();
        assert_eq!(admin.unwrap().role, UserRole::Admin);
        assert!(auth
            .bootstrap_admin("admin2", "admin2@clinic.test", "admin-password")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let auth = service();
        auth.register(user_request("dup", UserRole::Dentist))
            .await
            .unwrap();
        let mut again = user_request("dup", UserRole::Dentist);
        again.email = "other@clinic.test".to_string();
        assert!(matches!(
            auth.register(again).await,
            Err(DentalError::Conflict(_))
        ));
    }

    #[test]
    fn test_role_guards() {
        let caller = AuthUser {
            id: Uuid::new_v4(),
            username: "desk".to_string(),
            role: UserRole::Receptionist,
        };
        assert!(matches!(caller.require_delete(), Err(DentalError::Permission(_))));
        assert!(caller.require_admin().is_err());
        assert!(caller
            .require_any(&[UserRole::Receptionist, UserRole::Dentist])
            .is_ok());
    }
}
