#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供肺部肿瘤经皮热消融的术前穿刺路径自动规划算法.
//!
//! 输入是分割得到的肿瘤标签掩膜与各器官表面网格, 输出是每根消融针的
//! 进针点, 靶点, 消融半径, 消融区网格与覆盖评价. 该 crate 仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 网格顶点与掩膜原点均使用世界毫米坐标; 掩膜索引按 `(z, h, w)`
//!   顺序组织, 与常见 CT 体数据的轴序一致.
//! 2. 在非期望情况下, 程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 表面网格, AABB 与线段求交加速结构 ✅
//!
//! 实现位于 `ct-lancet/src/geom`.
//!
//! ### 消融椭球: 最小旋转对齐, 表面网格化与包围盒 ✅
//!
//! 以 +X 为长轴的标准椭球经单次最小旋转对齐进针方向,
//! 反平行时绕 +Y 转半圈.
//!
//! 实现位于 `ct-lancet/src/geom/ellipsoid.rs`.
//!
//! ### 掩膜体数据, 形态学膨胀与椭球体素化 ✅
//!
//! 实现位于 `ct-lancet/src/volume`.
//!
//! ### 皮肤 / 障碍 / 肿瘤三类点云抽取 ✅
//!
//! 实现位于 `ct-lancet/src/sample`.
//!
//! ### 自动针数与固定针数的靶点聚类 ✅
//!
//! 种子注入的 k 均值, 质心按字典序排序, 同种子同输入结果逐位一致.
//!
//! 实现位于 `ct-lancet/src/cluster`.
//!
//! ### 硬约束过滤, 三目标打分与帕累托择优 ✅
//!
//! 实现位于 `ct-lancet/src/plan/{avoid,objective,pareto}.rs`.
//!
//! ### 覆盖评价, 流水线编排与后台任务封装 ✅
//!
//! 实现位于 `ct-lancet/src/plan`.

/// 世界坐标系下的一个点, 单位毫米.
pub type WorldPoint = nalgebra::Point3<f64>;

/// 世界坐标系下的一个向量, 单位毫米.
pub type WorldVec = nalgebra::Vector3<f64>;

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

/// 几何底座: 网格, 包围盒, 求交与消融椭球.
pub mod geom;

pub mod cluster;
pub mod plan;
pub mod sample;
pub mod volume;

pub mod prelude;
