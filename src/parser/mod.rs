//! A hand-rolled recursive-descent parser for the statement grammar (§6):
//! SELECT, EXPLAIN, CREATE STREAM, DROP, DESCRIBE, SHOW. Accepts exactly
//! one statement per call; a syntax error carries the byte offset the
//! parser had reached.
mod lexer;

use crate::ast::clause::{Column, JoinClause, SelectItem, SinkClause, SourceClause, SourceRef, WindowClause};
use crate::ast::expr::{BinaryOp, Expr, Literal, UnaryOp};
use crate::ast::statement::{CreateStreamStatement, DescribeStatement, DropStatement, SelectStatement, ShowKind, ShowStatement, Statement};
use crate::err::Error;
use crate::types::Type;
use lexer::{lex, Tok, Token};

struct Parser {
	tokens: Vec<Token>,
	pos: usize,
}

pub fn parse_statement(input: &str) -> Result<Statement, Error> {
	let tokens = lex(input)?;
	let mut parser = Parser {
		tokens,
		pos: 0,
	};
	let stmt = parser.parse_statement()?;
	parser.expect_eof()?;
	Ok(stmt)
}

impl Parser {
	fn peek(&self) -> &Token {
		&self.tokens[self.pos]
	}

	fn pos_here(&self) -> usize {
		self.peek().pos
	}

	fn advance(&mut self) -> Token {
		let tok = self.tokens[self.pos].clone();
		if self.pos + 1 < self.tokens.len() {
			self.pos += 1;
		}
		tok
	}

	fn err(&self, message: impl Into<String>) -> Error {
		Error::ParseError {
			position: self.pos_here(),
			message: message.into(),
		}
	}

	fn at_kw(&self, word: &str) -> bool {
		matches!(&self.peek().tok, Tok::Ident(s) if s.eq_ignore_ascii_case(word))
	}

	fn eat_kw(&mut self, word: &str) -> Result<(), Error> {
		if self.at_kw(word) {
			self.advance();
			Ok(())
		} else {
			Err(self.err(format!("expected '{}'", word.to_uppercase())))
		}
	}

	fn eat_op(&mut self, op: &str) -> Result<(), Error> {
		if matches!(&self.peek().tok, Tok::Op(o) if *o == op) {
			self.advance();
			Ok(())
		} else {
			Err(self.err(format!("expected '{op}'")))
		}
	}

	fn at_op(&self, op: &str) -> bool {
		matches!(&self.peek().tok, Tok::Op(o) if *o == op)
	}

	fn eat_ident(&mut self) -> Result<String, Error> {
		match &self.peek().tok {
			Tok::Ident(s) => {
				let s = s.clone();
				self.advance();
				Ok(s)
			}
			_ => Err(self.err("expected an identifier")),
		}
	}

	fn expect_eof(&self) -> Result<(), Error> {
		if matches!(self.peek().tok, Tok::Eof) {
			Ok(())
		} else {
			Err(self.err("unexpected trailing input"))
		}
	}

	fn parse_statement(&mut self) -> Result<Statement, Error> {
		if self.at_kw("EXPLAIN") {
			self.advance();
			let inner = self.parse_statement()?;
			return Ok(Statement::Explain(Box::new(inner)));
		}
		if self.at_kw("SELECT") {
			return Ok(Statement::Select(self.parse_select()?));
		}
		if self.at_kw("CREATE") {
			return Ok(Statement::CreateStream(self.parse_create_stream()?));
		}
		if self.at_kw("DROP") {
			return Ok(Statement::Drop(self.parse_drop()?));
		}
		if self.at_kw("DESCRIBE") {
			return Ok(Statement::Describe(self.parse_describe()?));
		}
		if self.at_kw("SHOW") {
			return Ok(Statement::Show(self.parse_show()?));
		}
		Err(self.err("expected a statement (SELECT, EXPLAIN, CREATE STREAM, DROP, DESCRIBE, SHOW)"))
	}

	fn parse_select(&mut self) -> Result<SelectStatement, Error> {
		self.eat_kw("SELECT")?;
		let projection = self.parse_projection()?;
		self.eat_kw("FROM")?;
		let primary = self.parse_source_ref()?;

		let join = if self.at_kw("JOIN") {
			self.advance();
			let right = self.parse_source_ref()?;
			self.eat_kw("ON")?;
			let on = self.parse_expr()?;
			Some(JoinClause {
				right,
				on,
				keys: Vec::new(),
			})
		} else {
			None
		};

		let filter = if self.at_kw("WHERE") {
			self.advance();
			Some(self.parse_expr()?)
		} else {
			None
		};

		let group_by = if self.at_kw("GROUP") {
			self.advance();
			self.eat_kw("BY")?;
			let mut keys = vec![self.parse_expr()?];
			while self.at_op(",") {
				self.advance();
				keys.push(self.parse_expr()?);
			}
			keys
		} else {
			Vec::new()
		};

		let having = if self.at_kw("HAVING") {
			self.advance();
			Some(self.parse_expr()?)
		} else {
			None
		};

		let window = if self.at_kw("WINDOW") {
			self.advance();
			self.eat_kw("TUMBLING")?;
			self.eat_op("(")?;
			let size = self.parse_expr()?;
			self.eat_op(")")?;
			Some(WindowClause {
				size,
			})
		} else {
			None
		};

		let sink = if self.at_kw("INTO") {
			self.advance();
			if self.at_kw("CONSOLE") {
				self.advance();
				SinkClause::Console
			} else if self.at_kw("MEMORY") {
				self.advance();
				SinkClause::Memory(self.eat_ident()?)
			} else {
				return Err(self.err("expected CONSOLE or MEMORY after INTO"));
			}
		} else {
			SinkClause::Console
		};

		Ok(SelectStatement {
			projection,
			source: SourceClause {
				primary,
				join,
			},
			filter,
			group_by,
			having,
			window,
			sink,
		})
	}

	fn parse_projection(&mut self) -> Result<Vec<SelectItem>, Error> {
		if self.at_op("*") {
			self.advance();
			return Ok(vec![SelectItem::new(Expr::identifier("*"), None)]);
		}
		let mut items = vec![self.parse_select_item()?];
		while self.at_op(",") {
			self.advance();
			items.push(self.parse_select_item()?);
		}
		Ok(items)
	}

	fn parse_select_item(&mut self) -> Result<SelectItem, Error> {
		let expr = self.parse_expr()?;
		let alias = if self.at_kw("AS") {
			self.advance();
			Some(self.eat_ident()?)
		} else {
			None
		};
		Ok(SelectItem::new(expr, alias))
	}

	fn parse_source_ref(&mut self) -> Result<SourceRef, Error> {
		let stream = self.eat_ident()?;
		let alias = if self.at_kw("AS") {
			self.advance();
			Some(self.eat_ident()?)
		} else {
			None
		};
		Ok(SourceRef::new(stream, alias))
	}

	fn parse_create_stream(&mut self) -> Result<CreateStreamStatement, Error> {
		self.eat_kw("CREATE")?;
		self.eat_kw("STREAM")?;
		let name = self.eat_ident()?;
		self.eat_op("(")?;
		let mut columns: Vec<Column> = vec![self.parse_column()?];
		while self.at_op(",") {
			self.advance();
			columns.push(self.parse_column()?);
		}
		self.eat_op(")")?;
		Ok(CreateStreamStatement {
			name,
			columns,
		})
	}

	fn parse_column(&mut self) -> Result<Column, Error> {
		let name = self.eat_ident()?;
		let ty = self.parse_type()?;
		Ok((name, ty))
	}

	fn parse_type(&mut self) -> Result<Type, Error> {
		let word = self.eat_ident()?;
		if word.eq_ignore_ascii_case("NULLABLE") {
			self.eat_op("(")?;
			let inner = self.parse_type()?;
			self.eat_op(")")?;
			return Ok(inner.nullable());
		}
		match word.to_uppercase().as_str() {
			"BOOLEAN" => Ok(Type::Boolean),
			"INT" => Ok(Type::Int),
			"BIGINT" => Ok(Type::BigInt),
			"FLOAT" => Ok(Type::Float),
			"DOUBLE" => Ok(Type::Double),
			"STRING" => Ok(Type::String),
			"TIMESTAMP" => Ok(Type::Timestamp),
			"TIMESPAN" => Ok(Type::Timespan),
			other => Err(self.err(format!("unknown type name '{other}'"))),
		}
	}

	fn parse_drop(&mut self) -> Result<DropStatement, Error> {
		self.eat_kw("DROP")?;
		if self.at_kw("STREAM") {
			self.advance();
		}
		Ok(DropStatement {
			name: self.eat_ident()?,
		})
	}

	fn parse_describe(&mut self) -> Result<DescribeStatement, Error> {
		self.eat_kw("DESCRIBE")?;
		Ok(DescribeStatement {
			name: self.eat_ident()?,
		})
	}

	fn parse_show(&mut self) -> Result<ShowStatement, Error> {
		self.eat_kw("SHOW")?;
		self.eat_kw("STREAMS")?;
		Ok(ShowStatement {
			kind: ShowKind::Streams,
		})
	}

	// Expression grammar, lowest to highest precedence:
	// OR > AND > comparison > additive > multiplicative > unary > postfix-IS > primary
	fn parse_expr(&mut self) -> Result<Expr, Error> {
		self.parse_or()
	}

	fn parse_or(&mut self) -> Result<Expr, Error> {
		let mut left = self.parse_and()?;
		while self.at_kw("OR") {
			self.advance();
			let right = self.parse_and()?;
			left = Expr::binary(BinaryOp::Or, left, right);
		}
		Ok(left)
	}

	fn parse_and(&mut self) -> Result<Expr, Error> {
		let mut left = self.parse_comparison()?;
		while self.at_kw("AND") {
			self.advance();
			let right = self.parse_comparison()?;
			left = Expr::binary(BinaryOp::And, left, right);
		}
		Ok(left)
	}

	fn parse_comparison(&mut self) -> Result<Expr, Error> {
		let left = self.parse_additive()?;
		let op = match &self.peek().tok {
			Tok::Op("=") => Some(BinaryOp::Eq),
			Tok::Op("!=") => Some(BinaryOp::Ne),
			Tok::Op("<") => Some(BinaryOp::Lt),
			Tok::Op("<=") => Some(BinaryOp::Le),
			Tok::Op(">") => Some(BinaryOp::Gt),
			Tok::Op(">=") => Some(BinaryOp::Ge),
			_ => None,
		};
		match op {
			Some(op) => {
				self.advance();
				let right = self.parse_additive()?;
				Ok(Expr::binary(op, left, right))
			}
			None => Ok(left),
		}
	}

	fn parse_additive(&mut self) -> Result<Expr, Error> {
		let mut left = self.parse_multiplicative()?;
		loop {
			let op = match &self.peek().tok {
				Tok::Op("+") => BinaryOp::Add,
				Tok::Op("-") => BinaryOp::Sub,
				_ => break,
			};
			self.advance();
			let right = self.parse_multiplicative()?;
			left = Expr::binary(op, left, right);
		}
		Ok(left)
	}

	fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
		let mut left = self.parse_unary()?;
		loop {
			let op = match &self.peek().tok {
				Tok::Op("*") => BinaryOp::Mul,
				Tok::Op("/") => BinaryOp::Div,
				_ => break,
			};
			self.advance();
			let right = self.parse_unary()?;
			left = Expr::binary(op, left, right);
		}
		Ok(left)
	}

	fn parse_unary(&mut self) -> Result<Expr, Error> {
		if self.at_kw("NOT") {
			self.advance();
			let operand = self.parse_unary()?;
			return Ok(Expr::unary(UnaryOp::Not, operand));
		}
		if self.at_op("-") {
			self.advance();
			let operand = self.parse_unary()?;
			return Ok(Expr::unary(UnaryOp::Neg, operand));
		}
		self.parse_is_postfix()
	}

	fn parse_is_postfix(&mut self) -> Result<Expr, Error> {
		let mut expr = self.parse_primary()?;
		while self.at_kw("IS") {
			self.advance();
			if self.at_kw("NOT") {
				self.advance();
				self.eat_kw("NULL")?;
				expr = Expr::unary(UnaryOp::IsNotNull, expr);
			} else {
				self.eat_kw("NULL")?;
				expr = Expr::unary(UnaryOp::IsNull, expr);
			}
		}
		Ok(expr)
	}

	fn parse_primary(&mut self) -> Result<Expr, Error> {
		let tok = self.peek().tok.clone();
		match tok {
			Tok::Int(v) => {
				self.advance();
				Ok(Expr::constant(Literal::Int(v.try_into().unwrap_or(i32::MAX))))
			}
			Tok::Float(v) => {
				self.advance();
				Ok(Expr::constant(Literal::Double(v)))
			}
			Tok::Str(s) => {
				self.advance();
				Ok(Expr::constant(Literal::String(s)))
			}
			Tok::Op("(") => {
				self.advance();
				let inner = self.parse_expr()?;
				self.eat_op(")")?;
				Ok(inner)
			}
			Tok::Ident(word) => {
				if word.eq_ignore_ascii_case("TRUE") {
					self.advance();
					return Ok(Expr::constant(Literal::Boolean(true)));
				}
				if word.eq_ignore_ascii_case("FALSE") {
					self.advance();
					return Ok(Expr::constant(Literal::Boolean(false)));
				}
				if word.eq_ignore_ascii_case("NULL") {
					self.advance();
					return Ok(Expr::constant(Literal::Null));
				}
				self.advance();
				if self.at_op("(") {
					self.advance();
					let mut args = Vec::new();
					if !self.at_op(")") {
						args.push(self.parse_expr()?);
						while self.at_op(",") {
							self.advance();
							args.push(self.parse_expr()?);
						}
					}
					self.eat_op(")")?;
					return Ok(Expr::call(word, args));
				}
				if self.at_op(".") {
					self.advance();
					let field = self.eat_ident()?;
					return Ok(Expr::qualified(word, field));
				}
				Ok(Expr::identifier(word))
			}
			_ => Err(self.err("expected an expression")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_simple_select() {
		let stmt = parse_statement("SELECT a FROM s").unwrap();
		assert!(matches!(stmt, Statement::Select(_)));
	}

	#[test]
	fn parses_explain_select() {
		let stmt = parse_statement("EXPLAIN SELECT a FROM s").unwrap();
		assert!(matches!(stmt, Statement::Explain(_)));
	}

	#[test]
	fn parses_wildcard_projection() {
		let stmt = parse_statement("SELECT * FROM s").unwrap();
		match stmt {
			Statement::Select(sel) => assert_eq!(sel.projection.len(), 1),
			_ => panic!("expected select"),
		}
	}

	#[test]
	fn rejects_a_misspelled_keyword() {
		assert!(parse_statement("SELEKT 1").is_err());
	}

	#[test]
	fn parses_create_stream_with_nullable_column() {
		let stmt = parse_statement("CREATE STREAM orders (id INT, note NULLABLE(STRING))").unwrap();
		match stmt {
			Statement::CreateStream(cs) => {
				assert_eq!(cs.name, "orders");
				assert_eq!(cs.columns.len(), 2);
				assert_eq!(cs.columns[1].1, Type::String.nullable());
			}
			_ => panic!("expected create stream"),
		}
	}

	#[test]
	fn parses_join_filter_and_window() {
		let stmt = parse_statement(
			"SELECT amount FROM orders o JOIN shipments sh ON o.id = sh.order_id WHERE amount > 10 WINDOW TUMBLING (5) INTO MEMORY recent",
		)
		.unwrap();
		match stmt {
			Statement::Select(sel) => {
				assert!(sel.source.join.is_some());
				assert!(sel.filter.is_some());
				assert!(sel.window.is_some());
				assert!(matches!(sel.sink, SinkClause::Memory(ref n) if n == "recent"));
			}
			_ => panic!("expected select"),
		}
	}

	#[test]
	fn parses_is_null_postfix() {
		let stmt = parse_statement("SELECT a FROM s WHERE a IS NOT NULL").unwrap();
		match stmt {
			Statement::Select(sel) => assert!(matches!(sel.filter.unwrap().kind, crate::ast::expr::ExprKind::Unary { op: UnaryOp::IsNotNull, .. })),
			_ => panic!("expected select"),
		}
	}
}
