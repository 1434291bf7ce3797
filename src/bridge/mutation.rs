//! 单步变更应用
//!
//! apply_mutation 是两条路径（在线文档 / 快照）共用的语义：
//! - 创建类工具分配新 id 与递增 zIndex（框架固定 zIndex = 0，渲染在最底层）
//! - move / resize / updateText / changeColor 按 id 查找对象，找不到返回 NotFound（可恢复）
//! - updateText / changeColor 按对象类型决定修改哪个属性键
//!
//! apply_batch 把一组动作包在一个文档事务里，遇到第一个失败即停止，返回失败下标与已完成部分。

use serde_json::Value;

use crate::board::{BoardDocument, BoardObject, ObjectType, Transaction};
use crate::core::HiveError;
use crate::tools::catalog::{BoardTool, MutationAction, ShapeKind};

pub const STICKY_SIZE: f64 = 200.0;

/// 单步变更结果
#[derive(Debug, Clone, PartialEq)]
pub struct MutationApplied {
    pub affected_object_ids: Vec<String>,
    pub next_z_index: i64,
}

/// 批量变更结果：results[i] 为第 i 个成功动作影响的对象
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<Vec<String>>,
    pub affected_object_ids: Vec<String>,
    pub failed_index: Option<usize>,
    pub error: Option<HiveError>,
}

impl BatchOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// 是否有任何修改落到文档上（快照路径据此决定是否需要保存）
    pub fn changed(&self) -> bool {
        !self.affected_object_ids.is_empty()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn new_object(object_type: ObjectType, x: f64, y: f64, width: f64, height: f64, user_id: &str, z_index: i64) -> BoardObject {
    let mut obj = BoardObject::new(uuid::Uuid::new_v4().to_string(), object_type, x, y, width, height);
    obj.z_index = z_index;
    obj.created_by = user_id.to_string();
    obj.updated_at = now_ms();
    obj
}

fn existing<'t>(txn: &'t mut Transaction<'_>, id: &str) -> Result<&'t mut BoardObject, HiveError> {
    let obj = txn
        .get_mut(id)
        .ok_or_else(|| HiveError::NotFound(id.to_string()))?;
    obj.updated_at = now_ms();
    Ok(obj)
}

/// 在事务中应用一个已校验的工具
pub fn apply_mutation(
    txn: &mut Transaction<'_>,
    tool: &BoardTool,
    user_id: &str,
    next_z_index: i64,
) -> Result<MutationApplied, HiveError> {
    let mut next_z = next_z_index;
    let mut take_z = || {
        let z = next_z;
        next_z += 1;
        z
    };

    let affected = match tool {
        BoardTool::CreateStickyNote(args) => {
            let obj = new_object(ObjectType::StickyNote, args.x, args.y, STICKY_SIZE, STICKY_SIZE, user_id, take_z())
                .with_property("text", args.text.clone())
                .with_property("color", args.color.clone());
            let id = obj.id.clone();
            txn.insert(obj);
            vec![id]
        }
        BoardTool::CreateShape(args) => {
            let obj = match args.shape {
                ShapeKind::Line => new_object(ObjectType::Line, args.x, args.y, args.width, args.height, user_id, take_z())
                    .with_property("strokeColor", args.color.clone())
                    .with_property("x2", args.x + args.width)
                    .with_property("y2", args.y + args.height),
                ShapeKind::Rectangle | ShapeKind::Circle => {
                    let kind = if args.shape == ShapeKind::Circle {
                        ObjectType::Circle
                    } else {
                        ObjectType::Rectangle
                    };
                    new_object(kind, args.x, args.y, args.width, args.height, user_id, take_z())
                        .with_property("fillColor", args.color.clone())
                        .with_property("strokeColor", args.color.clone())
                }
            };
            let id = obj.id.clone();
            txn.insert(obj);
            vec![id]
        }
        BoardTool::CreateFrame(args) => {
            let obj = new_object(ObjectType::Frame, args.x, args.y, args.width, args.height, user_id, 0)
                .with_property("title", args.title.clone());
            let id = obj.id.clone();
            txn.insert(obj);
            vec![id]
        }
        BoardTool::CreateConnector(args) => {
            let from = txn
                .get(&args.from_id)
                .ok_or_else(|| HiveError::NotFound(args.from_id.clone()))?
                .bounds()
                .center();
            let to = txn
                .get(&args.to_id)
                .ok_or_else(|| HiveError::NotFound(args.to_id.clone()))?
                .bounds()
                .center();
            let obj = new_object(ObjectType::Connector, from.0, from.1, to.0 - from.0, to.1 - from.1, user_id, take_z())
                .with_property("fromId", args.from_id.clone())
                .with_property("toId", args.to_id.clone());
            let id = obj.id.clone();
            txn.insert(obj);
            vec![id]
        }
        BoardTool::MoveObject(args) => {
            let obj = existing(txn, &args.object_id)?;
            let (dx, dy) = (args.x - obj.x, args.y - obj.y);
            obj.x = args.x;
            obj.y = args.y;
            if obj.object_type == ObjectType::Line {
                shift_endpoint(obj, dx, dy);
            }
            vec![args.object_id.clone()]
        }
        BoardTool::ResizeObject(args) => {
            let obj = existing(txn, &args.object_id)?;
            obj.width = args.width;
            obj.height = args.height;
            if obj.object_type == ObjectType::Line {
                let (x2, y2) = (obj.x + obj.width, obj.y + obj.height);
                obj.properties.insert("x2".into(), x2.into());
                obj.properties.insert("y2".into(), y2.into());
            }
            vec![args.object_id.clone()]
        }
        BoardTool::UpdateText(args) => {
            let obj = existing(txn, &args.object_id)?;
            let key = obj.object_type.text_key();
            obj.properties
                .insert(key.to_string(), Value::String(args.new_text.clone()));
            vec![args.object_id.clone()]
        }
        BoardTool::ChangeColor(args) => {
            let obj = existing(txn, &args.object_id)?;
            let key = obj.object_type.color_key();
            obj.properties
                .insert(key.to_string(), Value::String(args.color.clone()));
            vec![args.object_id.clone()]
        }
        BoardTool::GetBoardState => {
            return Err(HiveError::Validation(
                "getBoardState is read-only and cannot be applied as a mutation".into(),
            ));
        }
    };

    Ok(MutationApplied {
        affected_object_ids: affected,
        next_z_index: next_z,
    })
}

fn shift_endpoint(obj: &mut BoardObject, dx: f64, dy: f64) {
    for (key, delta) in [("x2", dx), ("y2", dy)] {
        if let Some(v) = obj.properties.get(key).and_then(|v| v.as_f64()) {
            obj.properties.insert(key.into(), (v + delta).into());
        }
    }
}

/// 在一个文档事务中依次应用动作，遇到第一个失败即停止（已应用的修改保留）
pub fn apply_batch(doc: &mut BoardDocument, actions: &[MutationAction], user_id: &str) -> BatchOutcome {
    let mut next_z = doc.next_z_index();
    doc.transact(|txn| {
        let mut outcome = BatchOutcome::default();
        for (index, action) in actions.iter().enumerate() {
            let applied = action
                .parse()
                .and_then(|tool| apply_mutation(txn, &tool, user_id, next_z));
            match applied {
                Ok(applied) => {
                    next_z = applied.next_z_index;
                    outcome
                        .affected_object_ids
                        .extend(applied.affected_object_ids.iter().cloned());
                    outcome.results.push(applied.affected_object_ids);
                }
                Err(e) => {
                    tracing::warn!(index, tool = %action.tool, error = %e, "mutation failed, stopping batch");
                    outcome.failed_index = Some(index);
                    outcome.error = Some(e);
                    break;
                }
            }
        }
        outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(tool: &str, args: Value) -> MutationAction {
        MutationAction::new(tool, args)
    }

    fn sticky_action(x: f64) -> MutationAction {
        action("createStickyNote", json!({"text": "hi", "x": x, "y": 0, "color": "#ffeb3b"}))
    }

    #[test]
    fn test_create_assigns_increasing_z_and_frames_zero() {
        let mut doc = BoardDocument::new("b1");
        let outcome = apply_batch(
            &mut doc,
            &[
                sticky_action(0.0),
                action("createFrame", json!({"title": "F", "x": 0, "y": 0, "width": 500, "height": 500})),
                sticky_action(10.0),
            ],
            "u1",
        );
        assert!(outcome.success());
        let zs: Vec<_> = doc.objects().iter().map(|o| (o.object_type, o.z_index)).collect();
        assert_eq!(
            zs,
            vec![(ObjectType::StickyNote, 1), (ObjectType::Frame, 0), (ObjectType::StickyNote, 2)]
        );
        assert!(doc.objects().iter().all(|o| o.created_by == "u1"));
    }

    #[test]
    fn test_batch_stops_at_first_failure() {
        let mut doc = BoardDocument::new("b1");
        let outcome = apply_batch(
            &mut doc,
            &[
                sticky_action(0.0),
                action("moveObject", json!({"objectId": "ghost", "x": 1, "y": 1})),
                sticky_action(10.0),
            ],
            "u1",
        );
        assert_eq!(outcome.failed_index, Some(1));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.error, Some(HiveError::NotFound("ghost".into())));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_text_and_color_keys_follow_type() {
        let mut doc = BoardDocument::new("b1");
        let created = apply_batch(
            &mut doc,
            &[
                action("createFrame", json!({"title": "Old", "x": 0, "y": 0, "width": 10, "height": 10})),
                action("createShape", json!({"type": "circle", "x": 0, "y": 0, "width": 10, "height": 10, "color": "#000000"})),
            ],
            "u1",
        );
        let frame_id = created.results[0][0].clone();
        let circle_id = created.results[1][0].clone();
        let outcome = apply_batch(
            &mut doc,
            &[
                action("updateText", json!({"objectId": frame_id, "newText": "New"})),
                action("changeColor", json!({"objectId": circle_id, "color": "#ff0000"})),
            ],
            "u1",
        );
        assert!(outcome.success());
        assert_eq!(doc.get(&frame_id).unwrap().property_str("title"), Some("New"));
        assert_eq!(doc.get(&circle_id).unwrap().property_str("fillColor"), Some("#ff0000"));
    }

    #[test]
    fn test_line_endpoint_tracks_move() {
        let mut doc = BoardDocument::new("b1");
        let created = apply_batch(
            &mut doc,
            &[action("createShape", json!({"type": "line", "x": 10, "y": 10, "width": 100, "height": 0, "color": "#000"}))],
            "u1",
        );
        let id = created.results[0][0].clone();
        apply_batch(&mut doc, &[action("moveObject", json!({"objectId": id, "x": 20, "y": 30}))], "u1");
        let line = doc.get(&id).unwrap();
        assert_eq!(line.properties["x2"], json!(120.0));
        assert_eq!(line.properties["y2"], json!(30.0));
    }

    #[test]
    fn test_connector_requires_endpoints() {
        let mut doc = BoardDocument::new("b1");
        let outcome = apply_batch(
            &mut doc,
            &[action("createConnector", json!({"fromId": "a", "toId": "b"}))],
            "u1",
        );
        assert_eq!(outcome.error, Some(HiveError::NotFound("a".into())));
        assert!(!outcome.changed());
    }

    #[test]
    fn test_read_only_tool_rejected() {
        let mut doc = BoardDocument::new("b1");
        let outcome = apply_batch(&mut doc, &[action("getBoardState", json!({}))], "u1");
        assert_eq!(outcome.failed_index, Some(0));
        assert!(matches!(outcome.error, Some(HiveError::Validation(_))));
    }
}
