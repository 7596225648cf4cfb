//! 检索计划
//!
//! 过滤表达式由外部的 `PlanCompiler` 编译为谓词树，这里负责在其上
//! 补全输出字段、count 模式和 limit，并序列化后下发给分片。

use serde::{Deserialize, Serialize};

use crate::core::error::{ProxyError, ProxyResult};
use crate::core::schema::{CollectionSchema, TIMESTAMP_FIELD};
use crate::core::types::Ids;
use crate::query::output_fields::{translate_output_fields, translate_to_output_field_ids};
use crate::query::params::{QueryParams, UNLIMITED};

/// count(*) 查询的输出字段名
pub const COUNT_OUTPUT_FIELD: &str = "count(*)";

/// 谓词中的常量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenericValue {
    Bool(bool),
    Int64(i64),
    Float(f64),
    String(String),
}

impl std::fmt::Display for GenericValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenericValue::Bool(v) => write!(f, "{}", v),
            GenericValue::Int64(v) => write!(f, "{}", v),
            GenericValue::Float(v) => write!(f, "{}", v),
            GenericValue::String(v) => write!(f, "\"{}\"", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

/// 谓词树
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    AlwaysTrue,
    /// `field in [v1, v2, ...]`
    Term { field_id: i64, values: Vec<GenericValue> },
    Compare {
        field_id: i64,
        op: CompareOp,
        value: GenericValue,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// 编译器产出、代理层不需要理解的谓词，原样下发
    Opaque(String),
}

/// 检索部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlanNode {
    pub predicates: Option<Expr>,
    pub is_count: bool,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub query: QueryPlanNode,
    pub output_field_ids: Vec<i64>,
}

impl PlanNode {
    pub fn retrieve(predicates: Option<Expr>) -> Self {
        Self {
            query: QueryPlanNode {
                predicates,
                is_count: false,
                limit: UNLIMITED,
            },
            output_field_ids: Vec::new(),
        }
    }

    /// 谓词是否恒为真，此时必须带 limit
    pub fn is_always_true(&self) -> bool {
        matches!(self.query.predicates, Some(Expr::AlwaysTrue))
    }

    pub fn is_count(&self) -> bool {
        self.query.is_count
    }

    pub fn serialize(&self) -> ProxyResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> ProxyResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 过滤表达式编译器，由宿主系统提供
pub trait PlanCompiler: Send + Sync {
    fn create_retrieve_plan(&self, schema: &CollectionSchema, expr: &str) -> ProxyResult<PlanNode>;
}

/// 输出字段是否恰好是一个 `count(*)`
pub fn match_count_rule(output_fields: &[String]) -> bool {
    match output_fields {
        [only] => only.trim().to_lowercase() == COUNT_OUTPUT_FIELD,
        _ => false,
    }
}

/// count 计划；空表达式不需要编译
pub fn create_count_plan(
    compiler: &dyn PlanCompiler,
    schema: &CollectionSchema,
    expr: &str,
) -> ProxyResult<PlanNode> {
    if expr.is_empty() {
        let mut plan = PlanNode::retrieve(None);
        plan.query.is_count = true;
        return Ok(plan);
    }

    let mut plan = compiler.create_retrieve_plan(schema, expr)?;
    plan.query.is_count = true;
    Ok(plan)
}

/// 构建完成的计划及其输出字段
#[derive(Debug, Clone)]
pub struct BuiltPlan {
    pub plan: PlanNode,
    /// 下发给分片的字段 id，含时间戳系统字段
    pub output_field_ids: Vec<i64>,
    /// 返回给用户的字段标签
    pub user_output_fields: Vec<String>,
}

pub struct PlanBuilder<'a> {
    compiler: &'a dyn PlanCompiler,
    schema: &'a CollectionSchema,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(compiler: &'a dyn PlanCompiler, schema: &'a CollectionSchema) -> Self {
        Self { compiler, schema }
    }

    /// 根据表达式和输出字段构建计划
    pub fn build(&self, expr: &str, output_fields: &[String]) -> ProxyResult<BuiltPlan> {
        if match_count_rule(output_fields) {
            let plan = create_count_plan(self.compiler, self.schema, expr)?;
            return Ok(BuiltPlan {
                plan,
                output_field_ids: Vec::new(),
                user_output_fields: vec![COUNT_OUTPUT_FIELD.to_string()],
            });
        }

        let (field_names, user_output_fields) = if output_fields.is_empty() {
            let names: Vec<String> = self
                .schema
                .scalar_user_fields()
                .map(|f| f.name.clone())
                .collect();
            (Vec::new(), names)
        } else {
            translate_output_fields(output_fields, self.schema)?
        };

        let mut output_field_ids = translate_to_output_field_ids(&field_names, self.schema)?;
        output_field_ids.push(TIMESTAMP_FIELD);

        let mut plan = self.compiler.create_retrieve_plan(self.schema, expr)?;
        plan.output_field_ids = output_field_ids.clone();

        log::debug!(
            "检索计划构建完成, collection={}, expr={}, output_field_ids={:?}",
            self.schema.name,
            expr,
            output_field_ids
        );

        Ok(BuiltPlan {
            plan,
            output_field_ids,
            user_output_fields,
        })
    }

    /// 写入 limit 并检查计划与分页参数是否兼容
    pub fn apply_params(plan: &mut PlanNode, params: &QueryParams) -> ProxyResult<()> {
        plan.query.limit = params.fetch_limit();

        if plan.is_always_true() && plan.query.limit == UNLIMITED {
            return Err(ProxyError::UnboundedQuery);
        }
        if plan.is_count() && params.is_paginated() {
            return Err(ProxyError::CountWithPagination);
        }
        Ok(())
    }
}

/// 按主键列表生成过滤表达式
pub fn ids_to_expr(pk_name: &str, ids: &Ids) -> String {
    let values = match ids {
        Ids::Int(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        Ids::Str(values) => values
            .iter()
            .map(|v| format!("\"{}\"", v))
            .collect::<Vec<_>>()
            .join(", "),
    };
    format!("{} in [ {} ]", pk_name, values)
}
