//! Users, credentials and the material master.
use crate::auth::{self, Action};
use crate::draft::{MaterialDraft, NewUser};
use crate::error::{ValidationError, WorkflowError};
use crate::model::{InventoryLog, Material, TransactionType, User};
use crate::store::{self, Index};
use crate::types::{Principal, Role, TimeStamp};
use crate::utils;
use crate::workflow::IntakeService;

const BOOTSTRAP_KEY: &str = "bootstrap";

impl User {
    pub fn verify_password(&self, password: &str) -> Result<bool, WorkflowError> {
        Ok(bcrypt::verify(password, &self.password_hash)?)
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
            active: self.active,
        }
    }
}

impl IntakeService {
    fn insert_user(&self, new_user: &NewUser, bootstrap: bool) -> Result<User, WorkflowError> {
        new_user.validate()?;
        let user_id = utils::new_uuid_to_bech32("user_")?;
        // hashed once, outside the transaction sled may re-run
        let password_hash = bcrypt::hash(&new_user.password, self.password_cost)?;

        self.store.transaction(|tx| {
            if bootstrap {
                if store::index_get(tx, Index::Setting, BOOTSTRAP_KEY)?.is_some() {
                    return store::abort(WorkflowError::AlreadyBootstrapped);
                }
                store::index_put(tx, Index::Setting, BOOTSTRAP_KEY, &user_id)?;
            }
            if store::index_get(tx, Index::Username, &new_user.username)?.is_some() {
                return store::abort(ValidationError::DuplicateUsername(new_user.username.clone()));
            }

            let user = User {
                id: user_id.clone(),
                username: new_user.username.clone(),
                password_hash: password_hash.clone(),
                role: new_user.role,
                active: true,
                created_at: TimeStamp::new(),
            };
            store::put(tx, &user)?;
            store::index_put(tx, Index::Username, &user.username, &user.id)?;
            Ok(user)
        })
    }

    /// Creates the first administrator. Only ever succeeds once per store.
    pub fn bootstrap_admin(&self, username: &str, password: &str) -> Result<User, WorkflowError> {
        let user = self.insert_user(&NewUser::new(username, password, Role::Admin), true)?;
        log::info!("bootstrapped administrator {}", user.username);
        Ok(user)
    }

    pub fn create_user(&self, principal: &Principal, new_user: NewUser) -> Result<User, WorkflowError> {
        auth::authorize(principal, Action::ManageUsers)?;
        let user = self.insert_user(&new_user, false)?;
        log::info!("{} created {} user {}", principal.username, user.role, user.username);
        Ok(user)
    }

    /// Users are never deleted, only switched off.
    pub fn deactivate_user(&self, principal: &Principal, user_id: &str) -> Result<User, WorkflowError> {
        auth::authorize(principal, Action::ManageUsers)?;
        let user = self.store.transaction(|tx| {
            let mut user: User = store::require(tx, user_id)?;
            user.active = false;
            store::put(tx, &user)?;
            Ok(user)
        })?;
        log::info!("{} deactivated user {}", principal.username, user.username);
        Ok(user)
    }

    /// Verifies a credential and resolves it to a principal.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Principal, WorkflowError> {
        let Some(user_id) = self.store.lookup(Index::Username, username.trim())? else {
            log::warn!("login attempt for unknown user {username}");
            return Err(WorkflowError::AuthenticationFailed);
        };
        let user: User = self.store.require(&user_id)?;
        if !user.active || !user.verify_password(password)? {
            log::warn!("login rejected for {}", user.username);
            return Err(WorkflowError::AuthenticationFailed);
        }
        Ok(user.principal())
    }

    /// Resolves a stored user for a boundary that has already checked the credential.
    pub fn principal(&self, user_id: &str) -> Result<Principal, WorkflowError> {
        Ok(self.store.require::<User>(user_id)?.principal())
    }

    /// Every account, active or not, by username.
    pub fn list_users(&self, principal: &Principal) -> Result<Vec<Principal>, WorkflowError> {
        auth::authorize(principal, Action::ManageUsers)?;
        let mut users: Vec<Principal> = self.store.scan::<User>()?.iter().map(User::principal).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    pub fn list_officers(&self, principal: &Principal) -> Result<Vec<Principal>, WorkflowError> {
        auth::authorize(principal, Action::ListOfficers)?;
        let mut officers: Vec<Principal> = self
            .store
            .scan::<User>()?
            .iter()
            .filter(|u| u.is_active_officer())
            .map(User::principal)
            .collect();
        officers.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(officers)
    }

    pub fn create_material(
        &self,
        principal: &Principal,
        draft: MaterialDraft,
    ) -> Result<Material, WorkflowError> {
        auth::authorize(principal, Action::CreateMaterial)?;
        draft.validate()?;

        let material_id = utils::new_uuid_to_bech32("mat_")?;
        let material = self.store.transaction(|tx| {
            let code = draft.code.clone().unwrap_or_default();
            if store::index_get(tx, Index::MaterialCode, &code)?.is_some() {
                return store::abort(ValidationError::DuplicateMaterialCode(code));
            }
            let material = Material {
                id: material_id.clone(),
                code,
                name: draft.name.clone().unwrap_or_default(),
                description: draft.description.clone(),
                category: draft.category.clone().unwrap_or_default(),
                unit: draft.unit.clone().unwrap_or_default(),
                min_stock_level: draft.min_stock_level,
                current_stock: 0,
                created_at: TimeStamp::new(),
            };
            store::put(tx, &material)?;
            store::index_put(tx, Index::MaterialCode, &material.code, &material.id)?;
            Ok(material)
        })?;

        log::info!("material {} ({}) registered", material.code, material.name);
        Ok(material)
    }

    pub fn list_materials(&self, principal: &Principal) -> Result<Vec<Material>, WorkflowError> {
        auth::authorize(principal, Action::ViewMaterials)?;
        let mut materials = self.store.scan::<Material>()?;
        materials.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(materials)
    }

    pub fn material_by_code(&self, principal: &Principal, code: &str) -> Result<Material, WorkflowError> {
        auth::authorize(principal, Action::ViewMaterials)?;
        let material_id = self
            .store
            .lookup(Index::MaterialCode, code)?
            .ok_or_else(|| WorkflowError::not_found("material", code))?;
        self.store.require(&material_id)
    }

    /// Manual correction of a material's stock, posted as an ADJUSTMENT.
    pub fn adjust_stock(
        &self,
        principal: &Principal,
        material_id: &str,
        delta: i64,
        reason: &str,
    ) -> Result<InventoryLog, WorkflowError> {
        auth::authorize(principal, Action::AdjustStock)?;
        if delta == 0 {
            return Err(ValidationError::ZeroAdjustment.into());
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingField("adjustment reason").into());
        }

        let posting = self.store.transaction(|tx| {
            let mut material: Material = store::require(tx, material_id)?;
            let magnitude = delta.unsigned_abs();
            let balance = if delta > 0 {
                match material.current_stock.checked_add(magnitude) {
                    Some(balance) => balance,
                    None => return store::abort(ValidationError::QuantityOverflow),
                }
            } else {
                match material.current_stock.checked_sub(magnitude) {
                    Some(balance) => balance,
                    None => {
                        return store::abort(WorkflowError::InsufficientStock {
                            material: material.code.clone(),
                            available: material.current_stock,
                            requested: magnitude,
                        });
                    }
                }
            };
            material.current_stock = balance;

            let posting = InventoryLog {
                id: utils::new_sequence_id(),
                material_id: material.id.clone(),
                change_quantity: delta,
                balance_after: balance,
                transaction_type: TransactionType::Adjustment,
                reference_id: utils::new_adjustment_reference(),
                remarks: Some(reason.to_string()),
                created_by: principal.id.clone(),
                created_at: TimeStamp::new(),
            };
            store::put(tx, &material)?;
            store::put(tx, &posting)?;
            Ok(posting)
        })?;

        log::info!(
            "{} adjusted material {} by {}, balance now {}",
            principal.username,
            posting.material_id,
            delta,
            posting.balance_after
        );
        Ok(posting)
    }
}
