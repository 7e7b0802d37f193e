//! 用户认证与会话
//!
//! 签发与校验携带角色信息的JWT；注册患者账户时
//! 原子地建立患者病历记录并把病历ID写进令牌。

use std::str::FromStr;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Datelike, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use neuroscan_core::{
    utils::{sequence_number, short_id},
    Account, Gender, NeuroscanError, Patient, Result, Role,
};
use neuroscan_store::{AccountStore, PatientStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// 开发环境的万能密码
///
/// 遗留的演示行为：仅在allow_dev_password开启时生效，
/// 生产部署必须关闭该开关并依赖真实的哈希校验。
const DEV_PASSWORD: &str = "password123";

/// 认证配置
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    /// 开发密码旁路开关
    pub allow_dev_password: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            token_expiry_hours: 24,
            allow_dev_password: true,
        }
    }
}

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 账户ID
    pub sub: String,
    pub email: String,
    pub role: String,
    /// 患者角色关联的病历ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// 过期时间
    pub exp: usize,
    /// 签发时间
    pub iat: usize,
    /// JWT ID
    pub jti: String,
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 注册请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// 登录/注册响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Account,
    pub access_token: String,
    pub refresh_token: String,
    /// 有效期（秒）
    pub expires_in: i64,
}

/// 认证服务
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    patients: Arc<dyn PatientStore>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        patients: Arc<dyn PatientStore>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            patients,
            config,
        }
    }

    /// 用argon2哈希密码
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| NeuroscanError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// 校验密码
    ///
    /// 真实的哈希比对为主路径；开发旁路接受固定密码
    /// 或已是哈希形态的输入，每次使用都会告警。
    fn verify_password(&self, account: &Account, submitted: &str) -> bool {
        if let Ok(parsed) = PasswordHash::new(&account.password_hash) {
            if Argon2::default()
                .verify_password(submitted.as_bytes(), &parsed)
                .is_ok()
            {
                return true;
            }
        }

        if self.config.allow_dev_password
            && (submitted == DEV_PASSWORD || submitted.starts_with("$argon2"))
        {
            warn!("Development password bypass used for {}", account.email);
            return true;
        }

        false
    }

    /// 用户登录
    pub async fn login(&self, request: LoginRequest) -> Result<SessionResponse> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(NeuroscanError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let account = self
            .accounts
            .find_by_email(&request.email)
            .await
            .ok_or_else(|| NeuroscanError::Auth("Invalid email or password".to_string()))?;

        if !self.verify_password(&account, &request.password) {
            return Err(NeuroscanError::Auth(
                "Invalid email or password".to_string(),
            ));
        }

        self.accounts
            .touch_last_login(&account.id, Utc::now())
            .await?;
        info!("User logged in: {}", account.email);
        self.issue(account)
    }

    /// 注册新账户
    ///
    /// 患者角色先建病历再建账户并相互关联；
    /// 账户插入唯一可能的失败是邮箱冲突，已提前检查，
    /// 不会留下半注册的账户。
    pub async fn register(&self, request: RegisterRequest) -> Result<SessionResponse> {
        if request.email.is_empty()
            || request.password.is_empty()
            || request.first_name.is_empty()
            || request.last_name.is_empty()
            || request.role.is_empty()
        {
            return Err(NeuroscanError::Validation(
                "Required fields: email, password, firstName, lastName, role".to_string(),
            ));
        }

        let role = Role::from_str(&request.role).ok().filter(Role::self_registrable);
        let Some(role) = role else {
            return Err(NeuroscanError::Validation(
                "Role must be one of: doctor, radiologist, patient".to_string(),
            ));
        };

        if self.accounts.find_by_email(&request.email).await.is_some() {
            return Err(NeuroscanError::Conflict(
                "Email already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let password_hash = self.hash_password(&request.password)?;

        let patient_id = if role == Role::Patient {
            let seq = self.patients.count().await + 1;
            let patient = Patient {
                id: short_id("pat"),
                patient_code: sequence_number("P", now.year(), seq),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                date_of_birth: request
                    .date_of_birth
                    .unwrap_or_else(|| now.date_naive()),
                gender: request.gender.unwrap_or(Gender::Other),
                contact_number: None,
                email: request.email.clone(),
                created_at: now,
                updated_at: now,
            };
            let patient = self.patients.insert(patient).await?;
            Some(patient.id)
        } else {
            None
        };

        let account = Account {
            id: short_id("usr"),
            email: request.email,
            password_hash,
            first_name: request.first_name,
            last_name: request.last_name,
            role,
            department: (role != Role::Patient)
                .then_some(request.department)
                .flatten(),
            specialization: (role != Role::Patient)
                .then_some(request.specialization)
                .flatten(),
            patient_id,
            created_at: now,
            last_login: Some(now),
        };

        let account = self.accounts.insert(account).await?;
        info!("Registered new {} account: {}", account.role.as_str(), account.email);
        self.issue(account)
    }

    /// 签发令牌
    fn issue(&self, account: Account) -> Result<SessionResponse> {
        let now = Utc::now();
        let exp = now + chrono::Duration::hours(self.config.token_expiry_hours);

        let claims = Claims {
            sub: account.id.clone(),
            email: account.email.clone(),
            role: account.role.as_str().to_string(),
            patient_id: account.patient_id.clone(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| NeuroscanError::Internal(format!("Token encoding failed: {}", e)))?;

        Ok(SessionResponse {
            user: account,
            refresh_token: format!("refresh_{}", token),
            access_token: token,
            expires_in: self.config.token_expiry_hours * 3600,
        })
    }

    /// 校验令牌
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                NeuroscanError::Auth("Token has expired".to_string())
            }
            _ => NeuroscanError::Auth("Invalid token".to_string()),
        })
    }

    /// 由令牌载荷取回账户
    ///
    /// 令牌有效但主体已不存在时同样按认证失败处理。
    pub async fn current_account(&self, claims: &Claims) -> Result<Account> {
        self.accounts
            .find_by_id(&claims.sub)
            .await
            .ok_or_else(|| NeuroscanError::Auth("User not found".to_string()))
    }
}
