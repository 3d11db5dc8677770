//! Order-condition rules and the editor that builds them.
//!
//! A rule block pairs a list of conditions with the orders to submit when the
//! conditions hold. The editor always exposes one trailing placeholder block,
//! and every block one trailing placeholder condition and order; editing a
//! placeholder materializes it. Each edit rebuilds the block list with one
//! element replaced, appended or removed.

use serde::{Deserialize, Serialize};

use crate::domain::error::StratifyError;
use crate::domain::indicator::Indicator;

pub const OPERATORS: &[&str] = &["==", "!=", "<", ">", "<=", ">=", "crossunder", "crossabove"];

pub const LOGICAL_OPERATORS: &[&str] = &["and", "or", "xor"];

/// Series and helpers offered for every operand, before indicator outputs.
pub const BASE_OPERANDS: &[&str] = &[
    "open",
    "high",
    "low",
    "close",
    "volume",
    "position_amount",
    "position_value",
    "avg_entry_price",
    "remaining_tradable_value",
    "unrealized_total_value",
    "realized_total_value",
    "min(, )",
    "max(, )",
    "abs()",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub start_parenthesis: bool,
    #[serde(default)]
    pub left_operand: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub right_operand: String,
    #[serde(default)]
    pub end_parenthesis: bool,
    #[serde(default)]
    pub logical_operator: String,
}

fn default_operator() -> String {
    "==".to_string()
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            start_parenthesis: false,
            left_operand: String::new(),
            operator: default_operator(),
            right_operand: String::new(),
            end_parenthesis: false,
            logical_operator: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    CancelAllOpenOrders,
}

impl OrderType {
    pub fn has_side_and_amount(self) -> bool {
        matches!(self, OrderType::Market | OrderType::Limit)
    }

    pub fn has_price(self) -> bool {
        self == OrderType::Limit
    }
}

impl std::str::FromStr for OrderType {
    type Err = StratifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            "cancel_all_open_orders" => Ok(OrderType::CancelAllOpenOrders),
            other => Err(StratifyError::validation("type", format!("unknown order type {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    #[default]
    Buy,
    Sell,
}

impl std::str::FromStr for OrderSide {
    type Err = StratifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(StratifyError::validation("side", format!("unknown order side {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "type", default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub side: OrderSide,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderCondition {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl OrderCondition {
    /// Conditions joined into one readable expression.
    pub fn to_expression(&self) -> String {
        let mut parts = Vec::new();
        for (i, c) in self.conditions.iter().enumerate() {
            let mut clause = String::new();
            if c.start_parenthesis {
                clause.push_str("( ");
            }
            clause.push_str(&format!("{} {} {}", c.left_operand, c.operator, c.right_operand));
            if c.end_parenthesis {
                clause.push_str(" )");
            }
            parts.push(clause);
            if i + 1 < self.conditions.len() && !c.logical_operator.is_empty() {
                parts.push(c.logical_operator.clone());
            }
        }
        parts.join(" ")
    }

    /// Problems that would make the rule unusable, in display order.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut depth: i32 = 0;
        for (i, c) in self.conditions.iter().enumerate() {
            let n = i + 1;
            if c.left_operand.trim().is_empty() || c.right_operand.trim().is_empty() {
                problems.push(format!("condition {n}: both operands are required"));
            }
            if !OPERATORS.contains(&c.operator.as_str()) {
                problems.push(format!("condition {n}: unknown operator {}", c.operator));
            }
            if c.start_parenthesis {
                depth += 1;
            }
            if c.end_parenthesis {
                depth -= 1;
                if depth < 0 {
                    problems.push(format!("condition {n}: closing parenthesis without opening"));
                    depth = 0;
                }
            }
            let is_last = n == self.conditions.len();
            let logical = c.logical_operator.as_str();
            if !is_last && logical.is_empty() {
                problems.push(format!("condition {n}: missing logical operator"));
            }
            if !logical.is_empty() && !LOGICAL_OPERATORS.contains(&logical) {
                problems.push(format!("condition {n}: unknown logical operator {logical}"));
            }
            if is_last && !logical.is_empty() {
                problems.push(format!("condition {n}: trailing logical operator"));
            }
        }
        if depth > 0 {
            problems.push("unbalanced parentheses".to_string());
        }
        if self.orders.is_empty() {
            problems.push("no orders".to_string());
        }
        for (i, o) in self.orders.iter().enumerate() {
            let n = i + 1;
            if o.order_type.has_side_and_amount() && o.amount.trim().is_empty() {
                problems.push(format!("order {n}: amount is required"));
            }
            if o.order_type.has_price() && o.price.trim().is_empty() {
                problems.push(format!("order {n}: price is required for limit orders"));
            }
        }
        problems
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEdit {
    StartParenthesis(bool),
    LeftOperand(String),
    Operator(String),
    RightOperand(String),
    EndParenthesis(bool),
    LogicalOperator(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderEdit {
    Type(OrderType),
    Side(OrderSide),
    Price(String),
    Amount(String),
}

/// A block as shown by the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockView {
    pub block: OrderCondition,
    pub is_placeholder: bool,
    /// Index of the trailing placeholder condition, when placeholders show.
    pub placeholder_condition: Option<usize>,
    pub placeholder_order: Option<usize>,
    pub editable: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderConditionBuilder {
    blocks: Vec<OrderCondition>,
    read_only: bool,
    hide_placeholders: bool,
}

impl OrderConditionBuilder {
    pub fn new(blocks: Vec<OrderCondition>) -> Self {
        Self {
            blocks,
            read_only: false,
            hide_placeholders: false,
        }
    }

    /// Same layout as an editable builder, placeholders included, with every
    /// edit refused. Used for strategies the viewer does not own.
    pub fn disabled(blocks: Vec<OrderCondition>) -> Self {
        Self {
            blocks,
            read_only: true,
            hide_placeholders: false,
        }
    }

    /// Conditions a run was started with: only the real rows are shown.
    pub fn read_only(blocks: Vec<OrderCondition>) -> Self {
        Self {
            blocks,
            read_only: true,
            hide_placeholders: true,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn blocks(&self) -> &[OrderCondition] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<OrderCondition> {
        self.blocks
    }

    /// Blocks as rendered: real blocks followed by the placeholder block,
    /// each padded with placeholder rows. A builder made with
    /// [`OrderConditionBuilder::read_only`] shows only real rows.
    pub fn view(&self) -> Vec<BlockView> {
        let mut views: Vec<BlockView> = self
            .blocks
            .iter()
            .map(|block| self.block_view(block.clone(), false))
            .collect();
        if !self.hide_placeholders {
            views.push(self.block_view(OrderCondition::default(), true));
        }
        views
    }

    fn block_view(&self, mut block: OrderCondition, is_placeholder: bool) -> BlockView {
        let editable = !self.read_only;
        if self.hide_placeholders {
            return BlockView {
                block,
                is_placeholder,
                placeholder_condition: None,
                placeholder_order: None,
                editable,
            };
        }
        let placeholder_condition = block.conditions.len();
        let placeholder_order = block.orders.len();
        block.conditions.push(Condition::default());
        block.orders.push(Order::default());
        BlockView {
            block,
            is_placeholder,
            placeholder_condition: Some(placeholder_condition),
            placeholder_order: Some(placeholder_order),
            editable,
        }
    }

    pub fn edit_condition(
        &mut self,
        block_index: usize,
        condition_index: usize,
        edit: ConditionEdit,
    ) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        let mut block = self.block_or_placeholder(block_index)?;
        let mut conditions = block.conditions.clone();
        match condition_index.cmp(&conditions.len()) {
            std::cmp::Ordering::Greater => {
                return Err(StratifyError::not_found("condition", condition_index));
            }
            std::cmp::Ordering::Equal => conditions.push(Condition::default()),
            std::cmp::Ordering::Less => {}
        }
        conditions[condition_index] = apply_condition_edit(&conditions[condition_index], edit)?;
        block.conditions = conditions;
        self.blocks = self.rebuilt_with(block_index, block);
        Ok(())
    }

    pub fn edit_order(
        &mut self,
        block_index: usize,
        order_index: usize,
        edit: OrderEdit,
    ) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        let mut block = self.block_or_placeholder(block_index)?;
        let mut orders = block.orders.clone();
        match order_index.cmp(&orders.len()) {
            std::cmp::Ordering::Greater => {
                return Err(StratifyError::not_found("order", order_index));
            }
            std::cmp::Ordering::Equal => orders.push(Order::default()),
            std::cmp::Ordering::Less => {}
        }
        orders[order_index] = apply_order_edit(&orders[order_index], edit);
        block.orders = orders;
        self.blocks = self.rebuilt_with(block_index, block);
        Ok(())
    }

    pub fn remove_condition(&mut self, block_index: usize, condition_index: usize) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        let block = self.existing_block(block_index)?;
        if condition_index >= block.conditions.len() {
            return Err(StratifyError::not_found("condition", condition_index));
        }
        let conditions = spliced(&block.conditions, condition_index);
        let updated = OrderCondition {
            conditions,
            orders: block.orders.clone(),
        };
        self.blocks = self.rebuilt_with(block_index, updated);
        Ok(())
    }

    pub fn remove_order(&mut self, block_index: usize, order_index: usize) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        let block = self.existing_block(block_index)?;
        if order_index >= block.orders.len() {
            return Err(StratifyError::not_found("order", order_index));
        }
        let orders = spliced(&block.orders, order_index);
        let updated = OrderCondition {
            conditions: block.conditions.clone(),
            orders,
        };
        self.blocks = self.rebuilt_with(block_index, updated);
        Ok(())
    }

    pub fn remove_block(&mut self, block_index: usize) -> Result<(), StratifyError> {
        self.ensure_editable()?;
        self.existing_block(block_index)?;
        self.blocks = spliced(&self.blocks, block_index);
        Ok(())
    }

    /// Operand suggestions: base series first, then indicator outputs.
    pub fn operand_suggestions(indicators: &[Indicator]) -> Vec<String> {
        BASE_OPERANDS
            .iter()
            .map(|s| s.to_string())
            .chain(indicators.iter().flat_map(Indicator::operand_names))
            .collect()
    }

    /// Picking a suggestion appends it to what was already typed.
    pub fn append_suggestion(current: &str, option: &str) -> String {
        if current.is_empty() {
            option.to_string()
        } else {
            format!("{current} {option}")
        }
    }

    fn ensure_editable(&self) -> Result<(), StratifyError> {
        if self.read_only {
            return Err(StratifyError::ReadOnly {
                reason: "order conditions cannot be edited here".into(),
            });
        }
        Ok(())
    }

    fn block_or_placeholder(&self, index: usize) -> Result<OrderCondition, StratifyError> {
        match index.cmp(&self.blocks.len()) {
            std::cmp::Ordering::Less => Ok(self.blocks[index].clone()),
            std::cmp::Ordering::Equal => Ok(OrderCondition::default()),
            std::cmp::Ordering::Greater => Err(StratifyError::not_found("order condition block", index)),
        }
    }

    fn existing_block(&self, index: usize) -> Result<&OrderCondition, StratifyError> {
        self.blocks
            .get(index)
            .ok_or_else(|| StratifyError::not_found("order condition block", index))
    }

    /// New block list with `index` replaced, or appended when it is the
    /// placeholder position.
    fn rebuilt_with(&self, index: usize, block: OrderCondition) -> Vec<OrderCondition> {
        if index == self.blocks.len() {
            self.blocks.iter().cloned().chain(std::iter::once(block)).collect()
        } else {
            self.blocks
                .iter()
                .enumerate()
                .map(|(i, b)| if i == index { block.clone() } else { b.clone() })
                .collect()
        }
    }
}

fn spliced<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, item)| item.clone())
        .collect()
}

fn apply_condition_edit(current: &Condition, edit: ConditionEdit) -> Result<Condition, StratifyError> {
    let mut next = current.clone();
    match edit {
        ConditionEdit::StartParenthesis(v) => next.start_parenthesis = v,
        ConditionEdit::EndParenthesis(v) => next.end_parenthesis = v,
        ConditionEdit::LeftOperand(v) => next.left_operand = v,
        ConditionEdit::RightOperand(v) => next.right_operand = v,
        ConditionEdit::Operator(op) => {
            if !OPERATORS.contains(&op.as_str()) {
                return Err(StratifyError::validation("operator", format!("unknown operator {op}")));
            }
            next.operator = op;
        }
        ConditionEdit::LogicalOperator(op) => {
            let op = if op == "none" { String::new() } else { op };
            if !op.is_empty() && !LOGICAL_OPERATORS.contains(&op.as_str()) {
                return Err(StratifyError::validation(
                    "logical_operator",
                    format!("unknown logical operator {op}"),
                ));
            }
            next.logical_operator = op;
        }
    }
    Ok(next)
}

fn apply_order_edit(current: &Order, edit: OrderEdit) -> Order {
    let mut next = current.clone();
    match edit {
        OrderEdit::Type(t) => next.order_type = t,
        OrderEdit::Side(s) => next.side = s,
        OrderEdit::Price(p) => next.price = p,
        OrderEdit::Amount(a) => next.amount = a,
    }
    next
}
