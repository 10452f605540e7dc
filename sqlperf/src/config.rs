use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use sqlperf_helper::executor::connect::ConnectOptions;
use sqlperf_helper::executor::database::Options;
use sqlperf_helper::executor::rounds::RoundOptions;
use sqlperf_helper::extension::params::ParamSet;
use std::fs;
use std::path::Path;

/// Overrides `connection.password` so it can stay out of the config file.
pub const PASSWORD_ENV: &str = "SQLPERF_PASSWORD";

#[derive(Debug, Deserialize)]
pub struct EnvConfig {
    pub connection: ConnectOptions,
    #[serde(default = "default_profile")]
    pub profile: bool,
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    // cap for text columns such as OBJECT_DEFINITION
    #[serde(default = "default_max_str_len")]
    pub max_str_len: usize,
    #[serde(default)]
    pub insert: InsertParams,
}

fn default_profile() -> bool {
    true
}

fn default_rounds() -> usize {
    RoundOptions::DEFAULT_ROUNDS
}

fn default_max_str_len() -> usize {
    1 << 16
}

impl EnvConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_json(&json, std::env::var(PASSWORD_ENV).ok())
            .with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn from_json(json: &str, password: Option<String>) -> anyhow::Result<Self> {
        let mut config: EnvConfig = serde_json::from_str(json)?;
        if let Some(password) = password {
            config.connection.password = password;
        }
        anyhow::ensure!(config.rounds > 0, "rounds must be at least 1");
        Ok(config)
    }

    pub fn connection_options(&self) -> Options {
        Options {
            max_str_len: self.max_str_len,
            ..Options::default()
        }
    }

    pub fn round_options(&self) -> RoundOptions {
        RoundOptions {
            rounds: self.rounds,
            profile: self.profile,
            ..RoundOptions::default()
        }
    }
}

/// Values bound to the `@` variables of the INSERT ... SELECT statements.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsertParams {
    pub creator: String,
    pub tenant_id: i64,
    // yesterday when unset
    pub report_date: Option<NaiveDate>,
    pub default_department: String,
    pub default_payment_type: String,
    pub default_product_category: String,
    pub default_unit: String,
    pub default_ghsj_unit: String,
    pub pro_coeff: f64,
    pub default_financial_time: i64,
}

impl Default for InsertParams {
    fn default() -> Self {
        Self {
            creator: "TestUser".to_string(),
            tenant_id: 1,
            report_date: None,
            default_department: "默认部门".to_string(),
            default_payment_type: "现金".to_string(),
            default_product_category: "混凝土".to_string(),
            default_unit: "方".to_string(),
            default_ghsj_unit: "吨".to_string(),
            pro_coeff: 2.4,
            default_financial_time: 6,
        }
    }
}

impl InsertParams {
    pub fn report_date(&self) -> NaiveDate {
        self.report_date.unwrap_or_else(|| {
            let today = Local::now().naive_local().date();
            today.pred_opt().unwrap_or(today)
        })
    }

    pub fn to_params(&self) -> ParamSet {
        ParamSet::new()
            .set("Creator", self.creator.as_str())
            .set("TenantID", self.tenant_id)
            .set("ReportDate", self.report_date())
            .set("DefaultDepartment", self.default_department.as_str())
            .set("DefaultPaymentType", self.default_payment_type.as_str())
            .set("DefaultProductCategory", self.default_product_category.as_str())
            .set("DefaultUnit", self.default_unit.as_str())
            .set("DefaultGHSJUnit", self.default_ghsj_unit.as_str())
            .set("ProCoeff", self.pro_coeff)
            .set("DefaultFinancialTime", self.default_financial_time)
    }
}
